//! Scripted in-process OAuth provider.
//!
//! Each call pops the next scripted result. An empty script is a transport
//! failure, so an unexpected call never silently succeeds.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use gauth_lib::models::oauth::{AppOAuthCredentials, TokenBundle};
use gauth_lib::services::{OAuthProvider, ProviderError};
use secrecy::{ExposeSecret, SecretString};

#[derive(Default)]
pub struct MockProvider {
    script: Mutex<VecDeque<Result<TokenBundle, ProviderError>>>,
    calls: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next provider call.
    pub fn push(&self, result: Result<TokenBundle, ProviderError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh token sent on the most recent refresh call.
    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().unwrap().clone()
    }

    fn next(&self) -> Result<TokenBundle, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("no scripted response".to_string())))
    }
}

#[async_trait]
impl OAuthProvider for MockProvider {
    async fn exchange_code(
        &self,
        _credentials: &AppOAuthCredentials,
        _code: &SecretString,
        _redirect_uri: &str,
    ) -> Result<TokenBundle, ProviderError> {
        self.next()
    }

    async fn refresh(
        &self,
        _credentials: &AppOAuthCredentials,
        refresh_token: &SecretString,
    ) -> Result<TokenBundle, ProviderError> {
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.expose_secret().to_string());
        self.next()
    }
}
