//! Parameter bundle for delegate visit calls.

use serde::{Deserialize, Serialize};

use crate::visit::{Extras, Visit};

/// Context handed to the delegate for visit-mutating calls.
///
/// `visit` is the current visit when the call amends one (saving extras) and
/// absent when starting fresh. `extras` carries caller-supplied attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitParams {
    visitor_token: String,
    visit: Option<Visit>,
    extras: Option<Extras>,
}

impl VisitParams {
    pub fn new(
        visitor_token: impl Into<String>,
        visit: Option<Visit>,
        extras: Option<Extras>,
    ) -> Self {
        Self {
            visitor_token: visitor_token.into(),
            visit,
            extras,
        }
    }

    pub fn visitor_token(&self) -> &str {
        &self.visitor_token
    }

    pub fn visit(&self) -> Option<&Visit> {
        self.visit.as_ref()
    }

    pub fn extras(&self) -> Option<&Extras> {
        self.extras.as_ref()
    }
}
