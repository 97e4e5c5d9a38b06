//! # CaptchaService
//!
//! Issues one-time numeric challenges and consumes them. A challenge is
//! removed on its first consumption attempt whatever the outcome.

use std::sync::Arc;

use domains::{Captcha, CaptchaRenderer, CaptchaRepository, Clock, IssuedCaptcha, Result};
use tracing::{debug, warn};

use crate::tokens::{self, CAPTCHA_ID_LEN, CAPTCHA_SOLUTION_LEN};

pub struct CaptchaService {
    repo: Arc<dyn CaptchaRepository>,
    renderer: Arc<dyn CaptchaRenderer>,
    clock: Arc<dyn Clock>,
}

impl CaptchaService {
    pub fn new(
        repo: Arc<dyn CaptchaRepository>,
        renderer: Arc<dyn CaptchaRenderer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            renderer,
            clock,
        }
    }

    /// Stores a fresh challenge and returns its id with the rendered image.
    ///
    /// An id collision surfaces as the repository's error; there is no retry.
    pub async fn issue(&self) -> Result<IssuedCaptcha> {
        let captcha = Captcha {
            id: tokens::alphanumeric(CAPTCHA_ID_LEN),
            solution: tokens::digits(CAPTCHA_SOLUTION_LEN),
            created: self.clock.now(),
        };
        let captcha_svg = self.renderer.render(&captcha.solution);
        let captcha_id = captcha.id.clone();
        self.repo.insert(captcha).await?;
        debug!(captcha_id = %captcha_id, "issued captcha");
        Ok(IssuedCaptcha {
            captcha_id,
            captcha_svg,
        })
    }

    /// True iff the challenge existed and `solution` matches it.
    ///
    /// Malformed input returns false without touching the store. A store
    /// failure is logged and counts as a failed attempt.
    pub async fn consume(&self, id: &str, solution: &str) -> bool {
        if !tokens::is_captcha_id(id) || solution.chars().count() != CAPTCHA_SOLUTION_LEN {
            return false;
        }
        match self.repo.take_solution(id).await {
            Ok(Some(expected)) => expected == solution,
            Ok(None) => false,
            Err(err) => {
                warn!(captcha_id = %id, error = %err, "captcha consumption failed");
                false
            }
        }
    }
}
