//! Engine behaviour over the in-memory store with a hand-driven clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use domains::{
    Captcha, CaptchaRenderer, CaptchaRepository, DomainError, IssuedCaptcha, ListingOrder,
    ManualClock, PostId,
};
use services::{
    spawn_job, BoardEngine, CaptchaPruner, CaptchaService, HtmlSanitizer, JobTrigger, PageCache,
    PeriodicJob, PostPolicy, PostService, RetentionPruner, SubmitPost,
};
use storage_adapters::MemoryStore;
use tokio::sync::mpsc;

struct PlainRenderer;

impl CaptchaRenderer for PlainRenderer {
    fn render(&self, solution: &str) -> String {
        format!("<svg>{solution}</svg>")
    }
}

struct Board {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    engine: BoardEngine,
}

impl Board {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let cache = Arc::new(PageCache::new(10, TimeDelta::seconds(30), clock.clone()));
        let captchas = CaptchaService::new(store.clone(), Arc::new(PlainRenderer), clock.clone());
        let engine = BoardEngine::new(Self::post_service(&store, &clock), captchas, cache);
        Self {
            store,
            clock,
            engine,
        }
    }

    fn post_service(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>) -> PostService {
        PostService::new(
            store.clone(),
            Arc::new(HtmlSanitizer),
            clock.clone(),
            PostPolicy::default(),
        )
    }

    /// Direct access to the post relation, for seeding without captchas.
    fn posts(&self) -> PostService {
        Self::post_service(&self.store, &self.clock)
    }

    fn solve(&self, captcha: &IssuedCaptcha) -> String {
        self.store
            .peek_solution(&captcha.captcha_id)
            .expect("captcha should be stored")
    }

    async fn submission(&self, content: &str, on_thread: Option<PostId>) -> SubmitPost {
        let captcha = self.engine.issue_captcha().await.unwrap();
        SubmitPost {
            content: content.to_string(),
            pic: String::new(),
            on_thread,
            captcha_solution: self.solve(&captcha),
            captcha_id: captcha.captcha_id,
        }
    }
}

#[tokio::test]
async fn test_post_then_reuse_captcha_conflicts() {
    let board = Board::new();
    let submission = board.submission("first!", None).await;

    let accepted = board.engine.create_post(submission.clone()).await.unwrap();
    assert_eq!(accepted.receipt.id, 1);
    assert_eq!(accepted.receipt.delete_code.len(), 4);
    assert_ne!(accepted.next_captcha.captcha_id, submission.captcha_id);

    let rejected = board.engine.create_post(submission).await.unwrap_err();
    assert_eq!(
        rejected.error,
        DomainError::Conflict("captcha solution incorrect".to_string())
    );
    assert!(rejected.next_captcha.is_some());
    assert_eq!(board.store.post_count().await, 1);
}

#[tokio::test]
async fn test_empty_content_leaves_captcha_unspent() {
    let board = Board::new();
    let mut submission = board.submission("x", None).await;
    submission.content = "   ".to_string();

    let rejected = board.engine.create_post(submission.clone()).await.unwrap_err();
    assert!(matches!(rejected.error, DomainError::Validation(_)));
    assert!(rejected.next_captcha.is_none());
    assert!(board.store.peek_solution(&submission.captcha_id).is_some());
}

#[tokio::test]
async fn test_wrong_solution_still_consumes_captcha() {
    let board = Board::new();
    let mut submission = board.submission("hello", None).await;
    let right = submission.captcha_solution.clone();
    submission.captcha_solution = if right == "0000" { "1111" } else { "0000" }.to_string();

    let rejected = board.engine.create_post(submission.clone()).await.unwrap_err();
    assert!(matches!(rejected.error, DomainError::Conflict(_)));
    assert!(board.store.peek_solution(&submission.captcha_id).is_none());

    // the right answer is useless now
    submission.captcha_solution = right;
    assert!(board.engine.create_post(submission).await.is_err());
}

#[tokio::test]
async fn test_reply_to_missing_thread_creates_nothing() {
    let board = Board::new();
    let submission = board.submission("anyone here?", Some(42)).await;

    let rejected = board.engine.create_post(submission).await.unwrap_err();
    assert_eq!(rejected.error, DomainError::ThreadNotFound(42));
    assert!(rejected.next_captcha.is_some());
    assert_eq!(board.store.post_count().await, 0);
}

#[tokio::test]
async fn test_reply_to_a_reply_is_refused() {
    let board = Board::new();
    let posts = board.posts();
    let root = posts.create_root("root", "").await.unwrap();
    let reply = posts.create_reply(root.id, "reply", "").await.unwrap();

    let submission = board.submission("nested", Some(reply.id)).await;
    let rejected = board.engine.create_post(submission).await.unwrap_err();
    assert_eq!(rejected.error, DomainError::ThreadNotFound(reply.id));
    assert_eq!(board.store.post_count().await, 2);
}

#[tokio::test]
async fn test_untrusted_pic_is_refused_with_fresh_captcha() {
    let board = Board::new();
    let mut submission = board.submission("look at this", None).await;
    submission.pic = "https://evil.example/cat.png".to_string();

    let rejected = board.engine.create_post(submission).await.unwrap_err();
    assert_eq!(
        rejected.error,
        DomainError::Conflict("Not a supported image URL".to_string())
    );
    assert!(rejected.next_captcha.is_some());

    let mut submission = board.submission("look at this", None).await;
    submission.pic = "https://i.imgur.com/cat.png".to_string();
    let accepted = board.engine.create_post(submission).await.unwrap();
    let thread = board.engine.fetch_thread(accepted.receipt.id).await.unwrap();
    assert_eq!(thread[0].pic, "https://i.imgur.com/cat.png");
}

#[tokio::test]
async fn test_reply_bumps_thread_to_the_top() {
    let board = Board::new();
    let posts = board.posts();
    let older = posts.create_root("older", "").await.unwrap();
    board.clock.advance(TimeDelta::seconds(5));
    let newer = posts.create_root("newer", "").await.unwrap();
    board.clock.advance(TimeDelta::seconds(5));

    let submission = board.submission("bump", Some(older.id)).await;
    board.engine.create_post(submission).await.unwrap();

    let by_bump = board.engine.list_page(0, ListingOrder::Bumped).await.unwrap();
    assert_eq!(
        by_bump.iter().map(|t| t.id).collect::<Vec<_>>(),
        [older.id, newer.id]
    );
    assert_eq!(by_bump[0].replies, 1);
    assert_eq!(by_bump[1].replies, 0);

    let by_time = board.engine.list_page(0, ListingOrder::Created).await.unwrap();
    assert_eq!(
        by_time.iter().map(|t| t.id).collect::<Vec<_>>(),
        [newer.id, older.id]
    );
}

#[tokio::test]
async fn test_content_is_escaped_on_the_way_out() {
    let board = Board::new();
    let receipt = board
        .posts()
        .create_root("<b>bold</b> & brave", "")
        .await
        .unwrap();
    let thread = board.engine.fetch_thread(receipt.id).await.unwrap();
    assert_eq!(thread[0].content, "&lt;b&gt;bold&lt;/b&gt; &amp; brave");
}

#[tokio::test]
async fn test_listing_is_cached_until_ttl() {
    let board = Board::new();
    assert!(board
        .engine
        .list_page(0, ListingOrder::Bumped)
        .await
        .unwrap()
        .is_empty());

    board.posts().create_root("late arrival", "").await.unwrap();
    board.clock.advance(TimeDelta::seconds(29));
    assert!(board
        .engine
        .list_page(0, ListingOrder::Bumped)
        .await
        .unwrap()
        .is_empty());

    // creation order is never cached
    assert_eq!(
        board
            .engine
            .list_page(0, ListingOrder::Created)
            .await
            .unwrap()
            .len(),
        1
    );

    board.clock.advance(TimeDelta::seconds(1));
    assert_eq!(
        board
            .engine
            .list_page(0, ListingOrder::Bumped)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_negative_page_reads_first_page() {
    let board = Board::new();
    board.posts().create_root("only", "").await.unwrap();
    let first = board.engine.list_page(0, ListingOrder::Created).await.unwrap();
    let negative = board.engine.list_page(-3, ListingOrder::Created).await.unwrap();
    assert_eq!(first, negative);
}

#[tokio::test]
async fn test_pages_hold_fifteen_threads() {
    let board = Board::new();
    let posts = board.posts();
    for n in 0..20 {
        posts.create_root(&format!("thread {n}"), "").await.unwrap();
        board.clock.advance(TimeDelta::seconds(1));
    }
    let first = board.engine.list_page(0, ListingOrder::Created).await.unwrap();
    let second = board.engine.list_page(1, ListingOrder::Created).await.unwrap();
    assert_eq!(first.len(), 15);
    assert_eq!(second.len(), 5);
    assert_eq!(first[0].id, 20);
    assert_eq!(second[4].id, 1);
}

#[tokio::test]
async fn test_delete_root_cascades_and_wrong_code_removes_nothing() {
    let board = Board::new();
    let root = board.submission("root", None).await;
    let root = board.engine.create_post(root).await.unwrap().receipt;
    for text in ["one", "two"] {
        let reply = board.submission(text, Some(root.id)).await;
        board.engine.create_post(reply).await.unwrap();
    }
    assert_eq!(board.store.post_count().await, 3);

    let err = board.engine.delete_post(root.id, "nope").await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
    assert_eq!(board.store.post_count().await, 3);

    assert_eq!(
        board.engine.delete_post(root.id, &root.delete_code).await,
        Ok(root.id)
    );
    assert_eq!(board.store.post_count().await, 0);
    assert!(matches!(
        board.engine.fetch_thread(root.id).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_reply_leaves_thread_alone() {
    let board = Board::new();
    let posts = board.posts();
    let root = posts.create_root("root", "").await.unwrap();
    let reply = posts.create_reply(root.id, "reply", "").await.unwrap();
    posts.create_reply(root.id, "another", "").await.unwrap();

    board
        .engine
        .delete_post(reply.id, &reply.delete_code)
        .await
        .unwrap();
    let thread = board.engine.fetch_thread(root.id).await.unwrap();
    assert_eq!(thread.len(), 2);
    assert!(thread[0].is_root());
}

#[tokio::test]
async fn test_fetch_by_reply_id_returns_only_the_reply() {
    let board = Board::new();
    let posts = board.posts();
    let root = posts.create_root("root", "").await.unwrap();
    let reply = posts.create_reply(root.id, "reply", "").await.unwrap();

    let found = board.engine.fetch_thread(reply.id).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].on_thread, root.id);
}

#[tokio::test]
async fn test_retention_keeps_most_recently_bumped_threads() {
    let board = Board::new();
    let posts = board.posts();
    let mut ids = Vec::new();
    for n in 0..155 {
        let id = posts.create_root(&format!("thread {n}"), "").await.unwrap().id;
        if n == 1 {
            posts.create_reply(id, "doomed", "").await.unwrap();
        }
        ids.push(id);
        board.clock.advance(TimeDelta::seconds(1));
    }
    // the very first thread is revived by late replies, the next five are not
    posts.create_reply(ids[0], "still alive", "").await.unwrap();
    board.clock.advance(TimeDelta::seconds(1));
    posts.create_reply(ids[0], "bump again", "").await.unwrap();

    let pruner = RetentionPruner::new(board.store.clone(), 150);
    // five roots plus the one reply of a pruned thread
    assert_eq!(pruner.run_once().await.unwrap(), 6);

    assert_eq!(board.store.root_count().await, 150);
    assert_eq!(board.store.orphan_count().await, 0);
    assert!(board.engine.fetch_thread(ids[0]).await.is_ok());
    for pruned in &ids[1..6] {
        assert!(board.engine.fetch_thread(*pruned).await.is_err());
    }
    let listed: Vec<PostId> = board
        .engine
        .list_page(9, ListingOrder::Created)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert!(!listed.iter().any(|id| ids[1..6].contains(id)));

    // a second pass has nothing left to do
    assert_eq!(pruner.run_once().await.unwrap(), 0);
}

#[tokio::test]
async fn test_captcha_pruner_drops_only_stale_challenges() {
    let board = Board::new();
    let stale = board.engine.issue_captcha().await.unwrap();
    board.clock.advance(TimeDelta::minutes(4));
    let fresh = board.engine.issue_captcha().await.unwrap();
    board.clock.advance(TimeDelta::minutes(2));

    let pruner = CaptchaPruner::new(board.store.clone(), board.clock.clone(), TimeDelta::minutes(5));
    assert_eq!(pruner.run_once().await.unwrap(), 1);
    assert!(board.store.peek_solution(&stale.captcha_id).is_none());
    assert!(board.store.peek_solution(&fresh.captcha_id).is_some());
}

#[tokio::test]
async fn test_retention_job_runs_on_manual_trigger() {
    let board = Board::new();
    let posts = board.posts();
    for n in 0..4 {
        posts.create_root(&format!("thread {n}"), "").await.unwrap();
        board.clock.advance(TimeDelta::seconds(1));
    }

    let (tx, rx) = mpsc::channel(1);
    let handle = spawn_job(
        Arc::new(RetentionPruner::new(board.store.clone(), 2)),
        JobTrigger::Manual(rx),
    );
    tx.send(()).await.unwrap();
    drop(tx);
    while !handle.is_finished() {
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    assert_eq!(board.store.root_count().await, 2);
    handle.stop().await;
}

/// Captcha store that can be told to refuse new challenges.
struct JammedCaptchas {
    inner: Arc<MemoryStore>,
    refuse_inserts: AtomicBool,
}

#[async_trait]
impl CaptchaRepository for JammedCaptchas {
    async fn insert(&self, captcha: Captcha) -> domains::Result<()> {
        if self.refuse_inserts.load(Ordering::SeqCst) {
            return Err(DomainError::internal("captcha table is locked"));
        }
        self.inner.insert(captcha).await
    }

    async fn take_solution(&self, id: &str) -> domains::Result<Option<String>> {
        self.inner.take_solution(id).await
    }

    async fn delete_created_before(&self, boundary: DateTime<Utc>) -> domains::Result<u64> {
        self.inner.delete_created_before(boundary).await
    }
}

#[tokio::test]
async fn test_failed_next_captcha_commits_no_post() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ));
    let captchas = Arc::new(JammedCaptchas {
        inner: store.clone(),
        refuse_inserts: AtomicBool::new(false),
    });
    let engine = BoardEngine::new(
        Board::post_service(&store, &clock),
        CaptchaService::new(captchas.clone(), Arc::new(PlainRenderer), clock.clone()),
        Arc::new(PageCache::new(10, TimeDelta::seconds(30), clock.clone())),
    );

    let captcha = engine.issue_captcha().await.unwrap();
    let solution = store.peek_solution(&captcha.captcha_id).unwrap();
    captchas.refuse_inserts.store(true, Ordering::SeqCst);

    let rejected = engine
        .create_post(SubmitPost {
            content: "lost?".to_string(),
            captcha_id: captcha.captcha_id,
            captcha_solution: solution,
            ..SubmitPost::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(rejected.error, DomainError::Internal(_)));
    assert!(rejected.next_captcha.is_none());
    assert_eq!(store.post_count().await, 0);
}

#[tokio::test]
async fn test_missing_thread_reuses_the_prepared_captcha() {
    let board = Board::new();
    let submission = board.submission("reply", Some(404)).await;
    let before = board.store.captcha_count();

    let rejected = board.engine.create_post(submission).await.unwrap_err();
    assert_eq!(rejected.error, DomainError::ThreadNotFound(404));
    let next = rejected.next_captcha.expect("retry captcha");
    assert!(board.store.peek_solution(&next.captcha_id).is_some());
    // one spent, one issued
    assert_eq!(board.store.captcha_count(), before);
}
