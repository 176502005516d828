/// The slice of the browser session the broker reads and writes. The
/// session store itself (creation, persistence, logout destruction) is
/// owned by the layer wrapping the broker; a destroyed or fresh session is
/// simply the `Default` value, and a status query against it answers
/// `{"authenticated": false}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Set on successful password or FIDO2 login. Presence of a non-empty
    /// username is what "logged in" means to the broker.
    pub username: Option<String>,
    /// SCIM directory id of the user, cached here during lookups so a
    /// later patch can skip the search. Never authoritative - when it is
    /// absent the broker re-resolves instead of failing.
    pub scim_id: Option<String>,
}

impl SessionState {
    /// The authenticated username, if any. An empty string is treated the
    /// same as no login at all.
    pub fn authenticated_username(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }
}
