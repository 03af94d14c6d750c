use std::time::Duration;

use studyshelf_application::{NoticeLevel, Thumbnail, ViewerCommand, ViewerState};
use studyshelf_test::{FakeDoc, ViewerHarness};

#[test]
fn opening_renders_first_page_and_every_thumbnail() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(4).write(dir.path(), "four.pdf")?;
    let mut harness = ViewerHarness::new();

    harness.open(&path);
    assert_eq!(harness.session.state(), ViewerState::Loading);
    assert_eq!(harness.session.page_label(), "Page - of -");
    assert!(harness.settle());

    let session = &harness.session;
    assert_eq!(session.page_label(), "Page 1 of 4");
    assert_eq!(session.displayed().map(|d| d.width_px), Some(800));
    assert_eq!(session.load_progress(), 1.0);
    for (page, thumb) in session.thumbnails() {
        match thumb {
            Thumbnail::Ready(bitmap) => assert_eq!(bitmap.width, 40, "page {page}"),
            Thumbnail::Placeholder => panic!("page {page} has no thumbnail"),
        }
    }
    Ok(())
}

#[test]
fn paging_and_zoom_rerender_at_the_new_width() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(3).write(dir.path(), "three.pdf")?;
    let mut harness = ViewerHarness::new();
    harness.open(&path);
    assert!(harness.settle());

    harness.apply(ViewerCommand::Previous);
    assert_eq!(harness.session.current_page(), 1);

    harness.apply(ViewerCommand::Next);
    assert!(harness.pump_until(|s| s.displayed().is_some_and(|d| d.page == 2) && !s.is_busy()));

    harness.apply(ViewerCommand::ZoomIn);
    assert_eq!(harness.session.zoom_percent(), 125);
    assert!(harness.pump_until(|s| s.displayed().is_some_and(|d| d.width_px == 1000)));

    harness.apply(ViewerCommand::ResetZoom);
    assert!(harness.pump_until(|s| s.displayed().is_some_and(|d| d.width_px == 800)));

    harness.apply(ViewerCommand::GoTo(3));
    harness.apply(ViewerCommand::Next);
    assert!(harness.pump_until(|s| s.displayed().is_some_and(|d| d.page == 3) && !s.is_busy()));
    assert_eq!(harness.session.current_page(), 3);
    Ok(())
}

#[test]
fn rapid_page_changes_settle_on_the_last_target() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(10).delay_ms(20).write(dir.path(), "slow.pdf")?;
    let mut harness = ViewerHarness::new();
    harness.open(&path);
    assert!(harness.settle());

    for _ in 0..5 {
        harness.apply(ViewerCommand::Next);
    }
    assert_eq!(harness.session.current_page(), 6);
    assert_eq!(harness.session.state(), ViewerState::Rendering);

    assert!(harness.pump_until(|s| !s.is_busy()));
    assert_eq!(harness.session.displayed().map(|d| d.page), Some(6));
    assert_eq!(harness.session.state(), ViewerState::Ready);
    Ok(())
}

#[test]
fn missing_file_fails_then_retry_recovers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("later.pdf");
    let mut harness = ViewerHarness::new();

    harness.open(&path);
    assert!(harness.pump_until(|s| s.state() == ViewerState::Error));
    let notice = harness.session.notice().cloned();
    assert_eq!(
        notice.map(|n| (n.level, n.message)),
        Some((
            NoticeLevel::Error,
            "Failed to load document. Press r to retry.".to_string()
        ))
    );
    assert!(harness.session.error().is_some());

    FakeDoc::pages(2).write(dir.path(), "later.pdf")?;
    harness.apply(ViewerCommand::Retry);
    assert_eq!(harness.session.state(), ViewerState::Loading);
    assert!(harness.settle());
    assert_eq!(harness.session.total_pages(), 2);
    assert!(harness.session.error().is_none());
    Ok(())
}

#[test]
fn document_without_pages_is_an_open_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(0).write(dir.path(), "empty.pdf")?;
    let mut harness = ViewerHarness::new();
    harness.open(&path);
    assert!(harness.pump_until(|s| s.state() == ViewerState::Error));
    assert_eq!(harness.session.total_pages(), 0);
    Ok(())
}

#[test]
fn failed_page_keeps_the_previous_page_on_screen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(3).failing(2).write(dir.path(), "broken.pdf")?;
    let mut harness = ViewerHarness::new();
    harness.open(&path);
    assert!(harness.settle());

    harness.apply(ViewerCommand::Next);
    assert!(harness.pump_until(|s| s.notice().is_some() && !s.is_busy()));
    assert_eq!(harness.session.current_page(), 1);
    assert_eq!(harness.session.displayed().map(|d| d.page), Some(1));
    assert_eq!(harness.session.state(), ViewerState::Ready);
    assert!(matches!(harness.session.thumbnail(2), Thumbnail::Placeholder));
    assert!(matches!(harness.session.thumbnail(3), Thumbnail::Ready(_)));

    harness.apply(ViewerCommand::DismissNotice);
    assert!(harness.session.notice().is_none());
    Ok(())
}

#[test]
fn closing_mid_render_discards_late_completions() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(3).delay_ms(50).write(dir.path(), "slow.pdf")?;
    let mut harness = ViewerHarness::new();
    harness.open(&path);
    assert!(harness.pump_until(|s| s.state() == ViewerState::Rendering));
    let opened_as = harness.session.generation();

    harness.apply(ViewerCommand::Close);
    assert_eq!(harness.session.state(), ViewerState::Closed);
    harness.drain_for(Duration::from_millis(300));

    let session = &harness.session;
    assert_eq!(session.state(), ViewerState::Closed);
    assert!(session.generation() > opened_as);
    assert!(session.displayed().is_none());
    assert_eq!(session.cached_thumbnails(), 0);
    assert_eq!(session.total_pages(), 0);
    Ok(())
}

#[test]
fn reopening_replaces_the_previous_document() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let first = FakeDoc::pages(2).write(dir.path(), "first.pdf")?;
    let second = FakeDoc::pages(5).write(dir.path(), "second.pdf")?;
    let mut harness = ViewerHarness::new();

    harness.open(&first);
    assert!(harness.settle());
    harness.apply(ViewerCommand::ZoomIn);
    assert!(harness.pump_until(|s| !s.is_busy()));

    harness.open(&second);
    assert_eq!(harness.session.state(), ViewerState::Loading);
    assert_eq!(harness.session.zoom_percent(), 100);
    assert!(harness.settle());
    assert_eq!(harness.session.page_label(), "Page 1 of 5");
    Ok(())
}

#[test]
fn open_is_ignored_while_loading() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let first = FakeDoc::pages(2).write(dir.path(), "first.pdf")?;
    let second = FakeDoc::pages(7).write(dir.path(), "second.pdf")?;
    let mut harness = ViewerHarness::new();

    harness.open(&first);
    let generation = harness.session.generation();
    harness.open(&second);
    assert_eq!(harness.session.generation(), generation);
    assert!(harness.settle());
    assert_eq!(harness.session.total_pages(), 2);
    Ok(())
}

#[test]
fn suspend_cancels_and_resume_finishes_the_page() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(4).delay_ms(30).write(dir.path(), "slow.pdf")?;
    let mut harness = ViewerHarness::new();
    harness.open(&path);
    assert!(harness.settle());

    harness.apply(ViewerCommand::Next);
    assert!(harness.session.is_busy());
    harness.apply(ViewerCommand::Suspend);
    assert!(!harness.session.is_busy());
    harness.drain_for(Duration::from_millis(150));
    assert_eq!(harness.session.displayed().map(|d| d.page), Some(1));

    harness.apply(ViewerCommand::Resume);
    assert!(harness.session.is_busy());
    assert!(harness.pump_until(|s| s.displayed().is_some_and(|d| d.page == 2)));
    Ok(())
}

#[test]
fn resume_before_the_cancel_lands_keeps_one_render_in_flight() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(4).delay_ms(30).write(dir.path(), "slow.pdf")?;
    let mut harness = ViewerHarness::new();
    harness.open(&path);
    assert!(harness.settle());
    let before = harness.page_requests;

    harness.apply(ViewerCommand::Next);
    harness.apply(ViewerCommand::Suspend);
    harness.apply(ViewerCommand::Resume);
    assert!(harness.session.is_busy());
    assert_eq!(harness.page_requests, before + 2);

    assert!(harness.pump_until(|s| !s.is_busy() && s.displayed().is_some_and(|d| d.page == 2)));
    harness.drain_for(Duration::from_millis(150));
    assert_eq!(harness.page_requests, before + 2);
    assert!(!harness.session.is_busy());
    assert_eq!(harness.session.displayed().map(|d| d.page), Some(2));
    Ok(())
}

#[test]
fn resizing_the_surface_rerenders_the_page() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(1).write(dir.path(), "one.pdf")?;
    let mut harness = ViewerHarness::new();
    harness.open(&path);
    assert!(harness.settle());

    harness.apply(ViewerCommand::SetSurfaceWidth(640));
    assert!(harness.pump_until(|s| s.displayed().is_some_and(|d| d.width_px == 640)));
    assert!(!harness.session.can_go_next());
    assert!(!harness.session.can_go_previous());
    Ok(())
}
