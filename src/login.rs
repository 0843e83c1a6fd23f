//! Login: phone validation, instance state check, contact resolution.

use log::{info, warn};
use thiserror::Error;

use crate::api::{ApiClient, GatewayError, Instance};
use crate::config::{Contact, CredentialStore, Credentials};
use crate::storage::{KeyValueStore, StoreError};
use crate::utils::is_valid_phone;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    CheckingInstance,
    CheckingContact,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub instance_id: String,
    pub access_token: String,
    pub phone: String,
}

impl LoginForm {
    /// Prefill from whatever was stored last time.
    pub fn from_credentials(creds: &Credentials) -> Self {
        Self {
            instance_id: creds.instance_id.clone(),
            access_token: creds.access_token.clone(),
            phone: creds.contact_phone.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("Enter a valid phone number: 11 digits without spaces, country code included")]
    InvalidPhone,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Check the instance in your account dashboard, current instance state: {state}")]
    NotAuthorized { state: String },

    #[error("Phone number lookup failed, try another number")]
    PhoneRejected,

    #[error("Error: {0}")]
    ContactLookup(String),

    #[error("Something went wrong, please try again")]
    Unexpected(#[source] GatewayError),

    #[error("Could not save credentials: {0}")]
    Store(#[from] StoreError),

    #[error("Already logged in")]
    AlreadyReady,
}

impl LoginError {
    /// Whether the host should move focus back to the phone field.
    pub fn concerns_phone(&self) -> bool {
        matches!(self, LoginError::InvalidPhone | LoginError::PhoneRejected)
    }
}

type Observer = Box<dyn Fn(LoginState) + Send + Sync>;

pub struct LoginFlow<S> {
    client: ApiClient,
    credentials: CredentialStore<S>,
    state: LoginState,
    observer: Option<Observer>,
}

impl<S: KeyValueStore> LoginFlow<S> {
    pub fn new(client: ApiClient, credentials: CredentialStore<S>) -> Self {
        Self {
            client,
            credentials,
            state: LoginState::Idle,
            observer: None,
        }
    }

    /// Called on every state transition.
    pub fn with_observer(mut self, observer: impl Fn(LoginState) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn credentials(&self) -> &Credentials {
        self.credentials.credentials()
    }

    pub fn into_credentials(self) -> CredentialStore<S> {
        self.credentials
    }

    fn transition(&mut self, next: LoginState) {
        if self.state != next {
            info!("login: {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        if let Some(observer) = &self.observer {
            observer(next);
        }
    }

    fn back_to_idle(&mut self, err: LoginError) -> Result<Contact, LoginError> {
        warn!("login rejected: {err}");
        self.transition(LoginState::Idle);
        Err(err)
    }

    fn fail(&mut self, err: LoginError) -> Result<Contact, LoginError> {
        match &err {
            LoginError::Unexpected(source) => warn!("login failed: {source}"),
            other => warn!("login failed: {other}"),
        }
        self.transition(LoginState::Failed);
        Err(err)
    }

    /// Runs the whole flow for one submission. Returns the resolved contact
    /// once the flow reaches `Ready`.
    pub async fn submit(&mut self, form: &LoginForm) -> Result<Contact, LoginError> {
        if self.state == LoginState::Ready {
            return Err(LoginError::AlreadyReady);
        }
        if !is_valid_phone(&form.phone) {
            return self.back_to_idle(LoginError::InvalidPhone);
        }

        let instance = Instance::new(form.instance_id.trim(), form.access_token.trim());
        self.transition(LoginState::CheckingInstance);
        match self.client.check_account_state(&instance).await {
            Err(e) if e.is_network() => {
                warn!("instance check did not reach the gateway: {e}");
                return self.back_to_idle(LoginError::InvalidCredentials);
            }
            Err(e) => return self.fail(LoginError::Unexpected(e)),
            Ok(state) if !state.is_authorized() => {
                return self.back_to_idle(LoginError::NotAuthorized {
                    state: state.state_instance,
                });
            }
            Ok(_) => {}
        }
        if let Err(e) = self.credentials.set_instance(&instance) {
            return self.fail(e.into());
        }

        self.transition(LoginState::CheckingContact);
        let info = match self.client.resolve_contact(&instance, &form.phone).await {
            Ok(info) => info,
            Err(e) if e.status() == Some(400) => return self.back_to_idle(LoginError::PhoneRejected),
            Err(e) => return self.back_to_idle(LoginError::ContactLookup(e.to_string())),
        };
        let Some(chat_id) = info.resolved_chat_id() else {
            let raw = serde_json::to_string(&info).unwrap_or_default();
            return self.back_to_idle(LoginError::ContactLookup(raw));
        };

        let contact = Contact {
            phone: form.phone.clone(),
            chat_id: chat_id.to_string(),
            name: info.name.clone().unwrap_or_default(),
            avatar_url: info.avatar.clone().unwrap_or_default(),
        };
        if let Err(e) = self.credentials.set_contact(&contact) {
            return self.fail(e.into());
        }
        self.transition(LoginState::Ready);
        Ok(contact)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::storage::MemoryStore;

    fn offline_flow() -> LoginFlow<MemoryStore> {
        // nothing listens on port 9; validation failures must not get that far
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        LoginFlow::new(client, CredentialStore::open(MemoryStore::new()).unwrap())
    }

    #[tokio::test]
    async fn bad_phone_stays_idle_without_network() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut flow = offline_flow().with_observer(move |s| sink.lock().unwrap().push(s));

        for phone in ["", "7912345678", "7912345678x", "+79123456789"] {
            let form = LoginForm {
                instance_id: "1".into(),
                access_token: "t".into(),
                phone: phone.into(),
            };
            let err = flow.submit(&form).await.unwrap_err();
            assert!(matches!(err, LoginError::InvalidPhone));
            assert!(err.concerns_phone());
            assert_eq!(flow.state(), LoginState::Idle);
        }
        assert!(seen.lock().unwrap().iter().all(|s| *s == LoginState::Idle));
        assert_eq!(flow.credentials(), &Credentials::default());
    }

    #[tokio::test]
    async fn unreachable_gateway_reads_as_invalid_credentials() {
        let mut flow = offline_flow();
        let form = LoginForm {
            instance_id: "1".into(),
            access_token: "t".into(),
            phone: "79123456789".into(),
        };
        let err = flow.submit(&form).await.unwrap_err();
        assert!(matches!(err, LoginError::InvalidCredentials), "{err:?}");
        assert_eq!(flow.state(), LoginState::Idle);
        assert!(flow.credentials().instance_id.is_empty());
    }

    #[test]
    fn not_authorized_message_carries_state() {
        let err = LoginError::NotAuthorized {
            state: "blocked".into(),
        };
        assert!(err.to_string().contains("blocked"));
    }

    #[test]
    fn form_prefills_from_credentials() {
        let creds = Credentials {
            instance_id: "1101".into(),
            access_token: "tok".into(),
            contact_phone: "79123456789".into(),
            ..Credentials::default()
        };
        let form = LoginForm::from_credentials(&creds);
        assert_eq!(form.instance_id, "1101");
        assert_eq!(form.phone, "79123456789");
    }
}
