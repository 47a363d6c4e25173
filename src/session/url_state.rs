//! Playground URL binding
//!
//! The shareable playground URL mirrors the current session id in a single
//! query parameter. Its presence or absence is the only persisted
//! application state: pasting the URL elsewhere resumes the same session.

use crate::error::{PlaypenError, Result};
use url::Url;

/// Query parameter carrying the session id
pub const SESSION_QUERY_PARAM: &str = "session_id";

/// A playground URL whose query string mirrors the bound session
///
/// Invariant: at most one session id is reflected at any instant, and
/// clearing the binding removes the parameter entirely rather than leaving
/// an empty value.
#[derive(Debug, Clone)]
pub struct PlaygroundUrl {
    url: Url,
}

impl PlaygroundUrl {
    /// Parses the configured playground base URL
    ///
    /// # Errors
    ///
    /// Fails when the base is not a valid absolute URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use playpen::session::PlaygroundUrl;
    ///
    /// let url = PlaygroundUrl::new("http://localhost:3000/playground").unwrap();
    /// assert_eq!(url.session_id(), None);
    /// ```
    pub fn new(base: &str) -> Result<Self> {
        let url = Url::parse(base).map_err(PlaypenError::UrlParse)?;
        Ok(Self { url })
    }

    /// The session id currently encoded in the URL, if any
    pub fn session_id(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == SESSION_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }

    /// Rewrites the session binding
    ///
    /// `Some(id)` replaces any existing binding; `None` removes the
    /// parameter. Unrelated query parameters are preserved either way.
    pub fn set_session_id(&mut self, session_id: Option<&str>) {
        let retained: Vec<(String, String)> = self
            .url
            .query_pairs()
            .filter(|(key, _)| key != SESSION_QUERY_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        self.url.set_query(None);
        if retained.is_empty() && session_id.is_none() {
            return;
        }

        let mut pairs = self.url.query_pairs_mut();
        for (key, value) in &retained {
            pairs.append_pair(key, value);
        }
        if let Some(id) = session_id {
            pairs.append_pair(SESSION_QUERY_PARAM, id);
        }
    }

    /// The full URL as a string
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl std::fmt::Display for PlaygroundUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Extracts a session id from a pasted share target
///
/// Accepts either a full playground URL carrying the query parameter, or a
/// bare session id token.
pub fn parse_session_ref(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return url
            .query_pairs()
            .find(|(key, _)| key == SESSION_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());
    }
    Some(trimmed.to_string())
}
