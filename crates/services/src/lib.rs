//! # services
//!
//! The content lifecycle engine: captcha challenges, the post relation, the
//! listing cache, the retention jobs and the façade that ties them together.

pub mod cache;
pub mod captcha;
pub mod engine;
pub mod jobs;
pub mod posts;
pub mod pruning;
pub mod sanitizer;
pub mod tokens;

pub use cache::PageCache;
pub use captcha::CaptchaService;
pub use engine::{BoardEngine, PostAccepted, PostRejected, SubmitPost};
pub use jobs::{spawn_job, JobHandle, JobTrigger, PeriodicJob};
pub use posts::{PostPolicy, PostService};
pub use pruning::{CaptchaPruner, RetentionPruner};
pub use sanitizer::HtmlSanitizer;
