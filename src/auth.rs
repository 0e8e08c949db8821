use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use ahash::RandomState;
use moka::future::Cache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    backend::{Accounts, BackendError},
    session::{Session, SessionError, SessionStore},
};

const MIN_PASSWORD_LEN: usize = 6;
const OTP_LEN: usize = 6;
/// how long a sign up waits for its otp
pub const SIGN_UP_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("All fields are required")]
    MissingFields,
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
    #[error("Please enter a valid {OTP_LEN}-digit OTP")]
    InvalidOtp,
    #[error("Please enter both email and password")]
    MissingCredentials,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Backend(#[from] BackendError),
    #[error("no sign up is pending for {0}")]
    NoPendingSignUp(String),
    #[error("{0}")]
    Session(#[from] SessionError),
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    pub password: String,
    pub confirm_password: String,
}

fn default_country_code() -> String {
    "+91".to_string()
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("email regex is valid")
    })
}

impl SignUpForm {
    /// checks run in order, and the first failure is returned
    pub fn validate(&self) -> Result<(), ValidationError> {
        if [&self.name, &self.email, &self.phone, &self.password]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(ValidationError::MissingFields);
        }

        if !email_regex().is_match(&self.email) {
            return Err(ValidationError::InvalidEmail);
        }

        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }

        Ok(())
    }

    /// phone number with the country code prefixed
    pub fn full_phone(&self) -> String {
        format!("{}{}", self.country_code, self.phone)
    }
}

pub fn validate_otp(otp: &str) -> Result<(), ValidationError> {
    if otp.chars().count() != OTP_LEN {
        return Err(ValidationError::InvalidOtp);
    }
    Ok(())
}

/// Body of `POST /auth/register`
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub otp: String,
}

/// Sign up, sign in and the current user.
///
/// There's no real credential check on sign in, any non-empty email/password pair is accepted.
pub struct Auth {
    accounts: Arc<dyn Accounts>,
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<Session>>,
    // sign ups waiting for their otp, by email
    pending: Cache<String, SignUpForm, RandomState>,
}

fn pending_sign_ups(ttl: Duration) -> Cache<String, SignUpForm, RandomState> {
    Cache::<String, SignUpForm>::builder()
        .time_to_live(ttl)
        .build_with_hasher(RandomState::default())
}

impl Auth {
    /// reads the stored session, once
    pub fn new(accounts: Arc<dyn Accounts>, store: Arc<dyn SessionStore>) -> Self {
        let current = store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring stored session");
            None
        });

        Self {
            accounts,
            store,
            current: RwLock::new(current),
            pending: pending_sign_ups(SIGN_UP_TTL),
        }
    }

    /// forget unverified sign ups after `ttl` instead of [`SIGN_UP_TTL`]
    pub fn with_sign_up_ttl(mut self, ttl: Duration) -> Self {
        self.pending = pending_sign_ups(ttl);
        self
    }

    pub async fn current_user(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// validates the form and asks the backend to send an otp
    #[tracing::instrument(skip_all, fields(email = %form.email))]
    pub async fn sign_up(&self, form: SignUpForm) -> Result<(), AuthError> {
        form.validate()?;

        self.accounts
            .send_otp(&form.email, &form.full_phone())
            .await?;

        self.pending.insert(form.email.clone(), form).await;

        Ok(())
    }

    /// finishes a pending sign up, and signs the new user in
    #[tracing::instrument(skip(self, otp))]
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<Session, AuthError> {
        validate_otp(otp)?;

        let form = self
            .pending
            .get(email)
            .await
            .ok_or_else(|| AuthError::NoPendingSignUp(email.to_string()))?;

        let registration = Registration {
            name: form.name.clone(),
            email: form.email.clone(),
            phone: form.full_phone(),
            password: form.password.clone(),
            otp: otp.to_string(),
        };

        let token = self.accounts.register(&registration).await?;

        let session = Session {
            name: Some(registration.name),
            email: Some(registration.email),
            phone: Some(registration.phone),
            token: Some(token),
        };

        self.login(session.clone()).await?;
        self.pending.invalidate(email).await;

        tracing::info!("registered new user");

        Ok(session)
    }

    #[tracing::instrument(skip(self))]
    pub async fn resend_otp(&self, email: &str) -> Result<(), AuthError> {
        if email.trim().is_empty() {
            return Err(ValidationError::MissingFields.into());
        }

        self.accounts.resend_otp(email).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ValidationError::MissingCredentials.into());
        }

        let name = email.split('@').next().unwrap_or(email);

        let session = Session {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        };

        self.login(session.clone()).await?;

        Ok(session)
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        self.with_store(|store| store.clear()).await?;
        *self.current.write().await = None;
        Ok(())
    }

    async fn login(&self, session: Session) -> Result<(), AuthError> {
        let saved = session.clone();
        self.with_store(move |store| store.save(&saved)).await?;
        *self.current.write().await = Some(session);
        Ok(())
    }

    /// stores may touch the disk, so they run on the blocking pool
    async fn with_store<T: Send + 'static>(
        &self,
        f: impl FnOnce(&dyn SessionStore) -> Result<T, SessionError> + Send + 'static,
    ) -> Result<T, SessionError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(store.as_ref())).await?
    }
}
