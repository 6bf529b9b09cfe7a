//! Passphrase provider for encrypted images.
//!
//! The provider is owned by the caller and handed to [`crate::open_disc`] by
//! reference; decoders borrow the passphrase only while deriving key material.
//! The buffer is memoized across repeated requests within one process run and
//! wiped before release.

use crate::error::{DiscError, DiscResult};

/// Supplies a passphrase on demand for decoders that need one.
pub trait PassphraseSource {
    /// The passphrase, prompting at most once per process run.
    ///
    /// Fails with `AuthRequired` when none can be obtained.
    fn passphrase(&mut self) -> DiscResult<&[u8]>;

    /// Zero and release the cached buffer. Safe to call repeatedly.
    fn forget(&mut self);
}

/// Prompt callback: returns `None` when input fails or is aborted.
pub type PromptFn = dyn FnMut() -> Option<String>;

/// Memoizing [`PassphraseSource`].
///
/// Either pre-seeded with an explicit passphrase (skips prompting entirely)
/// or backed by a prompt callback invoked lazily on first need.
#[derive(Default)]
pub struct CachedPassphrase {
    cached: Option<Vec<u8>>,
    prompt: Option<Box<PromptFn>>,
}

impl CachedPassphrase {
    /// Provider that never prompts; any request fails with `AuthRequired`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Provider pre-seeded with an explicit passphrase.
    pub fn preseeded(passphrase: impl Into<String>) -> Self {
        Self {
            cached: Some(passphrase.into().into_bytes()),
            prompt: None,
        }
    }

    /// Provider that invokes `prompt` on first need.
    pub fn with_prompt(prompt: impl FnMut() -> Option<String> + 'static) -> Self {
        Self {
            cached: None,
            prompt: Some(Box::new(prompt)),
        }
    }
}

impl PassphraseSource for CachedPassphrase {
    fn passphrase(&mut self) -> DiscResult<&[u8]> {
        if self.cached.is_none() {
            let input = self.prompt.as_mut().and_then(|p| p());
            match input {
                Some(s) if !s.is_empty() => self.cached = Some(s.into_bytes()),
                Some(_) => {
                    log::warn!("empty passphrase supplied");
                    return Err(DiscError::AuthRequired);
                }
                None => return Err(DiscError::AuthRequired),
            }
        }
        Ok(self.cached.as_deref().unwrap_or(&[]))
    }

    fn forget(&mut self) {
        if let Some(mut buf) = self.cached.take() {
            for b in buf.iter_mut() {
                *b = 0;
            }
        }
    }
}

impl Drop for CachedPassphrase {
    fn drop(&mut self) {
        self.forget();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn preseeded_never_prompts() {
        let mut source = CachedPassphrase::preseeded("hunter2");
        assert_eq!(source.passphrase().unwrap(), b"hunter2");
    }

    #[test]
    fn empty_provider_fails_auth() {
        let mut source = CachedPassphrase::empty();
        assert!(matches!(source.passphrase(), Err(DiscError::AuthRequired)));
    }

    #[test]
    fn prompt_invoked_exactly_once() {
        let calls = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&calls);
        let mut source = CachedPassphrase::with_prompt(move || {
            counter.set(counter.get() + 1);
            Some("secret".to_string())
        });

        assert_eq!(source.passphrase().unwrap(), b"secret");
        assert_eq!(source.passphrase().unwrap(), b"secret");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn aborted_prompt_is_auth_required() {
        let mut source = CachedPassphrase::with_prompt(|| None);
        assert!(matches!(source.passphrase(), Err(DiscError::AuthRequired)));
    }

    #[test]
    fn forget_clears_the_cache() {
        let mut source = CachedPassphrase::preseeded("secret");
        source.passphrase().unwrap();
        source.forget();
        // no prompt configured, so a forgotten passphrase cannot come back
        assert!(matches!(source.passphrase(), Err(DiscError::AuthRequired)));
    }
}
