use secrecy::SecretString;
use tokio::sync::watch;

use super::identity::{AuthUser, IdentityProvider, UserSnapshot};
use super::AuthError;

/// Everything that moves the auth state.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    CheckSession,
    EmailSignInStarted,
    AnonymousSignInStarted,
    SignUpStarted,
    SignUpSucceeded,
    SignUpFailed(String),
    SignInSucceeded(UserSnapshot),
    SignInFailed(String),
    SignOutStarted,
    SignOutSucceeded,
    SignOutFailed(String),
}

/// `{current_user, error, loading}` for the sign-in surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    current_user: Option<UserSnapshot>,
    error: Option<String>,
    loading: bool,
}

impl AuthState {
    pub fn current_user(&self) -> Option<&UserSnapshot> {
        self.current_user.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn reduce(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::CheckSession => {}
            AuthEvent::EmailSignInStarted
            | AuthEvent::AnonymousSignInStarted
            | AuthEvent::SignUpStarted
            | AuthEvent::SignOutStarted => {
                self.loading = true;
                self.error = None;
            }
            // Sign-up continues straight into sign-in.
            AuthEvent::SignUpSucceeded => {}
            AuthEvent::SignInSucceeded(user) => {
                self.current_user = Some(user);
                self.error = None;
                self.loading = false;
            }
            AuthEvent::SignOutSucceeded => {
                self.current_user = None;
                self.error = None;
                self.loading = false;
            }
            AuthEvent::SignInFailed(reason)
            | AuthEvent::SignUpFailed(reason)
            | AuthEvent::SignOutFailed(reason) => {
                self.error = Some(reason);
                self.loading = false;
            }
        }
    }
}

/// Runs the auth flows against a provider and publishes the resulting
/// [`AuthState`].
///
/// Each flow is a chain of provider calls; the first failure ends the chain
/// and is reported both as the returned error and as a failure event.
pub struct AuthFlow<P> {
    provider: P,
    state: watch::Sender<AuthState>,
}

impl<P: IdentityProvider> AuthFlow<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            state: watch::Sender::new(AuthState::default()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn emit(&self, event: AuthEvent) {
        tracing::debug!(event = ?event, "Auth event");
        self.state.send_modify(|state| state.reduce(event));
    }

    /// Restores the previous session, if there is one. With no stored user
    /// this does nothing and returns `Ok(None)`.
    pub async fn check_session(&self) -> Result<Option<UserSnapshot>, AuthError> {
        self.emit(AuthEvent::CheckSession);
        match self.provider.current_user().await {
            Ok(Some(user)) => self.complete_sign_in(Ok(user), None).await.map(Some),
            Ok(None) => Ok(None),
            Err(e) => {
                self.emit(AuthEvent::SignInFailed(e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn sign_in_with_email(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<UserSnapshot, AuthError> {
        self.emit(AuthEvent::EmailSignInStarted);
        let user = self.provider.sign_in_with_email(email, password).await;
        self.complete_sign_in(user, None).await
    }

    pub async fn sign_in_anonymously(&self) -> Result<UserSnapshot, AuthError> {
        self.emit(AuthEvent::AnonymousSignInStarted);
        let user = self.provider.sign_in_anonymously().await;
        self.complete_sign_in(user, None).await
    }

    /// Creates an account and signs it in with `display_name` on its profile.
    pub async fn sign_up(
        &self,
        display_name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<UserSnapshot, AuthError> {
        self.emit(AuthEvent::SignUpStarted);
        let user = match self.provider.sign_up(email, password).await {
            Ok(user) => user,
            Err(e) => {
                self.emit(AuthEvent::SignUpFailed(e.to_string()));
                return Err(e);
            }
        };
        self.emit(AuthEvent::SignUpSucceeded);
        self.complete_sign_in(Ok(user), Some(display_name)).await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.emit(AuthEvent::SignOutStarted);
        match self.provider.sign_out().await {
            Ok(()) => {
                self.emit(AuthEvent::SignOutSucceeded);
                Ok(())
            }
            Err(e) => {
                self.emit(AuthEvent::SignOutFailed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn complete_sign_in(
        &self,
        user: Result<AuthUser, AuthError>,
        display_name: Option<&str>,
    ) -> Result<UserSnapshot, AuthError> {
        let snapshot = match user {
            Ok(user) => self.provider.fetch_profile(&user, display_name).await,
            Err(e) => Err(e),
        };
        match &snapshot {
            Ok(user) => self.emit(AuthEvent::SignInSucceeded(user.clone())),
            Err(e) => {
                tracing::warn!(error = %e, "Sign-in failed");
                self.emit(AuthEvent::SignInFailed(e.to_string()));
            }
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use std::sync::Mutex;

    /// In-memory provider: one account, optional failing profile reads.
    #[derive(Default)]
    struct FakeProvider {
        signed_in: Mutex<Option<String>>,
        display_name: Mutex<Option<String>>,
        calls: Mutex<Vec<&'static str>>,
        profile_fails: bool,
    }

    impl FakeProvider {
        fn user(&self, uid: &str) -> AuthUser {
            AuthUser {
                uid: uid.to_string(),
                email: Some("ada@example.com".into()),
                display_name: self.display_name.lock().unwrap().clone(),
                is_anonymous: uid == "anon",
                id_token: SecretString::from("tok".to_string()),
                refresh_token: None,
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn current_user(&self) -> Result<Option<AuthUser>, AuthError> {
            self.calls.lock().unwrap().push("current_user");
            let uid = self.signed_in.lock().unwrap().clone();
            Ok(uid.map(|uid| self.user(&uid)))
        }

        async fn sign_in_with_email(
            &self,
            _email: &str,
            password: &SecretString,
        ) -> Result<AuthUser, AuthError> {
            self.calls.lock().unwrap().push("sign_in_with_email");
            if password.expose_secret() != "right" {
                return Err(AuthError::Rejected("The email address or password is incorrect.".into()));
            }
            *self.signed_in.lock().unwrap() = Some("u1".into());
            Ok(self.user("u1"))
        }

        async fn sign_in_anonymously(&self) -> Result<AuthUser, AuthError> {
            self.calls.lock().unwrap().push("sign_in_anonymously");
            *self.signed_in.lock().unwrap() = Some("anon".into());
            Ok(self.user("anon"))
        }

        async fn sign_up(&self, _email: &str, password: &SecretString) -> Result<AuthUser, AuthError> {
            self.calls.lock().unwrap().push("sign_up");
            if password.expose_secret().len() < 6 {
                return Err(AuthError::Rejected("The password must be 6 characters long or more.".into()));
            }
            *self.signed_in.lock().unwrap() = Some("u2".into());
            Ok(self.user("u2"))
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            self.calls.lock().unwrap().push("sign_out");
            *self.signed_in.lock().unwrap() = None;
            Ok(())
        }

        async fn fetch_profile(
            &self,
            user: &AuthUser,
            display_name: Option<&str>,
        ) -> Result<UserSnapshot, AuthError> {
            self.calls.lock().unwrap().push("fetch_profile");
            if self.profile_fails {
                return Err(AuthError::HttpStatus(500));
            }
            if let Some(name) = display_name {
                *self.display_name.lock().unwrap() = Some(name.to_string());
            }
            Ok(UserSnapshot {
                id: user.uid.clone(),
                display_name: self.display_name.lock().unwrap().clone(),
                email: user.email.clone(),
                photo_url: None,
                created_at: None,
                is_anonymous: user.is_anonymous,
            })
        }
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn test_check_session_without_user_is_noop() {
        let flow = AuthFlow::new(FakeProvider::default());
        assert_eq!(flow.check_session().await.unwrap(), None);
        assert_eq!(flow.state(), AuthState::default());
        assert_eq!(flow.provider().calls(), vec!["current_user"]);
    }

    #[tokio::test]
    async fn test_email_sign_in_fetches_profile() {
        let flow = AuthFlow::new(FakeProvider::default());
        let user = flow.sign_in_with_email("ada@example.com", &secret("right")).await.unwrap();

        assert_eq!(user.id, "u1");
        let state = flow.state();
        assert_eq!(state.current_user(), Some(&user));
        assert!(!state.loading());
        assert_eq!(flow.provider().calls(), vec!["sign_in_with_email", "fetch_profile"]);
    }

    #[tokio::test]
    async fn test_failed_sign_in_short_circuits() {
        let flow = AuthFlow::new(FakeProvider::default());
        let err = flow
            .sign_in_with_email("ada@example.com", &secret("wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Rejected(_)));
        assert_eq!(flow.state().error(), Some("The email address or password is incorrect."));
        assert!(flow.state().current_user().is_none());
        assert_eq!(flow.provider().calls(), vec!["sign_in_with_email"]);
    }

    #[tokio::test]
    async fn test_profile_failure_reported_as_sign_in_failure() {
        let flow = AuthFlow::new(FakeProvider {
            profile_fails: true,
            ..FakeProvider::default()
        });
        assert!(flow.sign_in_anonymously().await.is_err());
        assert_eq!(flow.state().error(), Some("Identity service returned status 500"));
        assert!(!flow.state().loading());
    }

    #[tokio::test]
    async fn test_sign_up_chains_into_sign_in_with_name() {
        let flow = AuthFlow::new(FakeProvider::default());
        let user = flow
            .sign_up("Grace", "grace@example.com", &secret("longenough"))
            .await
            .unwrap();

        assert_eq!(user.display_name.as_deref(), Some("Grace"));
        assert_eq!(flow.provider().calls(), vec!["sign_up", "fetch_profile"]);
        assert_eq!(flow.state().current_user().map(|u| u.id.as_str()), Some("u2"));
    }

    #[tokio::test]
    async fn test_sign_up_failure() {
        let flow = AuthFlow::new(FakeProvider::default());
        assert!(flow.sign_up("Grace", "grace@example.com", &secret("abc")).await.is_err());
        assert_eq!(
            flow.state().error(),
            Some("The password must be 6 characters long or more.")
        );
        assert_eq!(flow.provider().calls(), vec!["sign_up"]);
    }

    #[tokio::test]
    async fn test_session_restored_then_signed_out() {
        let flow = AuthFlow::new(FakeProvider::default());
        flow.sign_in_anonymously().await.unwrap();

        let restored = flow.check_session().await.unwrap().unwrap();
        assert!(restored.is_anonymous);

        let mut rx = flow.subscribe();
        flow.sign_out().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().current_user(), None);
    }

    #[test]
    fn test_reducer_start_clears_error() {
        let mut state = AuthState::default();
        state.reduce(AuthEvent::SignInFailed("nope".into()));
        state.reduce(AuthEvent::EmailSignInStarted);
        assert!(state.loading());
        assert_eq!(state.error(), None);

        state.reduce(AuthEvent::SignUpSucceeded);
        assert!(state.loading());
    }
}
