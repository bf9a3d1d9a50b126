// ABOUTME: HTML page rendering for the login, consent, and error screens
// ABOUTME: include_str! templates with placeholder substitution, escaped interpolation
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright (c) 2026 Gatehouse Identity

//! HTML templates for the browser-facing pages.
//!
//! Templates are compiled into the binary and frozen into a [`TemplateSet`]
//! owned by the server resources. Every interpolated value is HTML-escaped;
//! the `pending_id` additionally goes through attribute escaping because it
//! lands inside a form value.

use html_escape::{encode_double_quoted_attribute, encode_text};

const LOGIN_TEMPLATE: &str = include_str!("../templates/login.html");
const CONSENT_TEMPLATE: &str = include_str!("../templates/consent.html");
const ERROR_TEMPLATE: &str = include_str!("../templates/error.html");

/// Immutable set of rendered-page templates.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    login: &'static str,
    consent: &'static str,
    error: &'static str,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateSet {
    /// Build the compiled-in template set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            login: LOGIN_TEMPLATE,
            consent: CONSENT_TEMPLATE,
            error: ERROR_TEMPLATE,
        }
    }

    /// Render the login form for a pending authorization. `error` re-renders
    /// the form with a message after a failed attempt.
    #[must_use]
    pub fn render_login(&self, pending_id: &str, client_name: &str, error: Option<&str>) -> String {
        let error_block = error.map_or_else(String::new, |msg| {
            format!("<p class=\"error\">{}</p>", encode_text(msg))
        });
        self.login
            .replace("{{CLIENT_NAME}}", &encode_text(client_name))
            .replace(
                "{{PENDING_ID}}",
                &encode_double_quoted_attribute(pending_id),
            )
            .replace("{{ERROR_BLOCK}}", &error_block)
    }

    /// Render the consent screen.
    #[must_use]
    pub fn render_consent(&self, pending_id: &str, client_name: &str, scope: Option<&str>) -> String {
        let scope_block = scope.map_or_else(String::new, |s| {
            format!("<div class=\"scope\">{}</div>", encode_text(s))
        });
        self.consent
            .replace("{{CLIENT_NAME}}", &encode_text(client_name))
            .replace(
                "{{PENDING_ID}}",
                &encode_double_quoted_attribute(pending_id),
            )
            .replace("{{SCOPE_BLOCK}}", &scope_block)
    }

    /// Render the standalone error page used for pre-redirect failures.
    #[must_use]
    pub fn render_error(&self, title: &str, message: &str) -> String {
        self.error
            .replace("{{TITLE}}", &encode_text(title))
            .replace("{{MESSAGE}}", &encode_text(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_interpolates_and_escapes() {
        let set = TemplateSet::new();
        let html = set.render_login("pid-123", "Web <App>", None);
        assert!(html.contains("pid-123"));
        assert!(html.contains("Web &lt;App&gt;"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn login_error_block_appears_only_on_failure() {
        let set = TemplateSet::new();
        assert!(!set.render_login("p", "c", None).contains("class=\"error\""));
        let html = set.render_login("p", "c", Some("Invalid username or password"));
        assert!(html.contains("Invalid username or password"));
    }

    #[test]
    fn pending_id_is_attribute_escaped() {
        let set = TemplateSet::new();
        let html = set.render_login("\"><script>", "c", None);
        assert!(!html.contains("\"><script>"));
    }

    #[test]
    fn consent_scope_block_is_optional() {
        let set = TemplateSet::new();
        assert!(!set.render_consent("p", "c", None).contains("class=\"scope\""));
        assert!(set
            .render_consent("p", "c", Some("profile email"))
            .contains("profile email"));
    }

    #[test]
    fn error_page_has_no_leftover_placeholders() {
        let set = TemplateSet::new();
        let html = set.render_error("Invalid request", "unknown client");
        assert!(html.contains("Invalid request"));
        assert!(html.contains("unknown client"));
        assert!(!html.contains("{{"));
    }
}
