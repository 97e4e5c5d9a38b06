//! # auth-adapters
//!
//! Human-verification adapters. Today that is the SVG captcha renderer
//! implementing `domains::CaptchaRenderer`.

pub mod captcha_svg;

pub use captcha_svg::SvgCaptchaRenderer;
