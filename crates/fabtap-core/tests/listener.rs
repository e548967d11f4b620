//! Listener state machine tests driven through scripted event sources.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use fabtap_core::{
    BlockEvent, BlockHandler, CursorStore, CursorWriter, DecodeError, FileCursorStore, Layer,
    Listener, ListenerState, MemoryCursorStore, ReplaySource, StopSignal, TapError,
};

use common::{Ending, FloodingSource, Recorder, ScriptedSource};

const DEADLINE: Duration = Duration::from_secs(5);

async fn listen(listener: &mut Listener) -> Result<(), TapError> {
    tokio::time::timeout(DEADLINE, listener.listen())
        .await
        .expect("listener did not stop in time")
}

#[tokio::test]
async fn end_bound_stops_after_first_block_past_it() {
    let source = Arc::new(ScriptedSource::blocks([101, 102]));
    let (recorder, _rx) = Recorder::new();

    let mut listener = Listener::builder()
        .source(source.clone())
        .handler(Box::new(recorder.clone()))
        .end_block(100)
        .build()
        .await
        .unwrap();

    listen(&mut listener).await.unwrap();

    assert_eq!(recorder.seen(), vec![101]);
    assert_eq!(listener.state(), ListenerState::Stopped);
    assert_eq!(source.unregisters(), 1);
    assert_eq!(*source.registered_from.lock().unwrap(), Some(None));
}

#[tokio::test]
async fn end_bound_is_inclusive() {
    let source = Arc::new(ScriptedSource::blocks(1..=10));
    let (recorder, _rx) = Recorder::new();

    let mut listener = Listener::builder()
        .source(source)
        .handler(Box::new(recorder.clone()))
        .start_block(1)
        .end_block(3)
        .build()
        .await
        .unwrap();

    listen(&mut listener).await.unwrap();
    assert_eq!(recorder.seen(), vec![1, 2, 3]);
}

#[tokio::test]
async fn stop_signal_exits_cleanly_and_runs_callback() {
    let source = Arc::new(ScriptedSource::blocks([1]));
    let (recorder, mut rx) = Recorder::new();
    let causes = Arc::new(Mutex::new(Vec::<String>::new()));
    let stop = StopSignal::new();

    let mut listener = Listener::builder()
        .source(source.clone())
        .handler(Box::new(recorder.clone()))
        .stop_signal(stop.clone())
        .on_shutdown({
            let causes = causes.clone();
            move |cause: &str| causes.lock().unwrap().push(cause.to_string())
        })
        .build()
        .await
        .unwrap();

    let task = tokio::spawn(async move {
        let result = listen(&mut listener).await;
        (result, listener.state())
    });

    assert_eq!(rx.recv().await, Some(1));
    stop.stop("SIGINT");

    let (result, state) = task.await.unwrap();
    result.unwrap();
    assert_eq!(state, ListenerState::Stopped);
    assert_eq!(*causes.lock().unwrap(), vec!["SIGINT".to_string()]);
    assert_eq!(source.unregisters(), 1);
}

#[tokio::test]
async fn stop_before_listen_handles_nothing() {
    let source = Arc::new(ScriptedSource::blocks([1, 2, 3]));
    let (recorder, _rx) = Recorder::new();
    let stop = StopSignal::new();
    stop.stop("shutdown");

    let mut listener = Listener::builder()
        .source(source.clone())
        .handler(Box::new(recorder.clone()))
        .stop_signal(stop)
        .build()
        .await
        .unwrap();

    listen(&mut listener).await.unwrap();
    assert!(recorder.seen().is_empty());
    assert_eq!(source.unregisters(), 1);
}

#[tokio::test]
async fn decode_failure_surfaces() {
    let source = Arc::new(ScriptedSource::new(vec![
        BlockEvent::Block(common::block(1)),
        BlockEvent::Block(common::corrupt_block(2)),
        BlockEvent::Block(common::block(3)),
    ]));
    let (recorder, _rx) = Recorder::new();

    let mut listener = Listener::builder()
        .source(source.clone())
        .handler(Box::new(recorder.clone()))
        .build()
        .await
        .unwrap();

    let err = listen(&mut listener).await.unwrap_err();
    assert!(matches!(
        err,
        TapError::Decode(DecodeError::Malformed {
            layer: Layer::Envelope,
            ..
        })
    ));
    assert_eq!(recorder.seen(), vec![1]);
    assert_eq!(source.unregisters(), 1);
}

#[tokio::test]
async fn handler_failure_surfaces() {
    let source = Arc::new(ScriptedSource::blocks(1..=5));
    let (recorder, _rx) = Recorder::new();
    let recorder = recorder.failing_at(2);

    let mut listener = Listener::builder()
        .source(source)
        .handler(Box::new(recorder.clone()))
        .build()
        .await
        .unwrap();

    let err = listen(&mut listener).await.unwrap_err();
    assert_eq!(err.to_string(), "Handler error in 'recorder': rejected block 2");
    assert_eq!(recorder.seen(), vec![1]);
}

#[tokio::test]
async fn registration_failure_surfaces() {
    let (recorder, _rx) = Recorder::new();
    let mut listener = Listener::builder()
        .source(Arc::new(ScriptedSource::failing()))
        .handler(Box::new(recorder.clone()))
        .build()
        .await
        .unwrap();

    let err = listen(&mut listener).await.unwrap_err();
    assert!(matches!(err, TapError::Registration(_)));
    assert_eq!(listener.state(), ListenerState::Stopped);
    assert!(recorder.seen().is_empty());
}

#[tokio::test]
async fn source_closing_is_a_normal_stop() {
    let source = Arc::new(ScriptedSource::new(vec![
        BlockEvent::Block(common::block(1)),
        BlockEvent::Closed,
        BlockEvent::Block(common::block(2)),
    ]));
    let (recorder, _rx) = Recorder::new();

    let mut listener = Listener::builder()
        .source(source.clone())
        .handler(Box::new(recorder.clone()))
        .build()
        .await
        .unwrap();

    listen(&mut listener).await.unwrap();
    assert_eq!(recorder.seen(), vec![1]);
    assert_eq!(source.unregisters(), 1);
}

#[tokio::test]
async fn dropped_sender_counts_as_closed() {
    let source = Arc::new(ScriptedSource::blocks([1, 2]).ending(Ending::DropSender));
    let (recorder, _rx) = Recorder::new();

    let mut listener = Listener::builder()
        .source(source)
        .handler(Box::new(recorder.clone()))
        .build()
        .await
        .unwrap();

    listen(&mut listener).await.unwrap();
    assert_eq!(recorder.seen(), vec![1, 2]);
}

#[tokio::test]
async fn full_buffer_is_drained_on_shutdown() {
    let source = Arc::new(ScriptedSource::blocks(1..=200).buffer(1));
    let (recorder, _rx) = Recorder::new();

    let mut listener = Listener::builder()
        .source(source)
        .handler(Box::new(recorder.clone()))
        .end_block(5)
        .build()
        .await
        .unwrap();

    listen(&mut listener).await.unwrap();
    assert_eq!(recorder.seen(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn blocks_pushed_after_unregister_are_drained_not_handled() {
    let source = Arc::new(FloodingSource::new(50, 1));
    let (recorder, _rx) = Recorder::new();

    let mut listener = Listener::builder()
        .source(source.clone())
        .handler(Box::new(recorder.clone()))
        .end_block(3)
        .build()
        .await
        .unwrap();

    listen(&mut listener).await.unwrap();
    assert_eq!(recorder.seen(), vec![1, 2, 3]);
    // Closed follows the trailing blocks, so all of them were consumed first.
    assert_eq!(source.trailing_sent(), 50);
    assert_eq!(listener.state(), ListenerState::Stopped);
}

#[tokio::test]
async fn stop_signal_drains_flooding_source() {
    let source = Arc::new(FloodingSource::new(20, 1));
    let (recorder, mut rx) = Recorder::new();
    let stop = StopSignal::new();

    let mut listener = Listener::builder()
        .source(source.clone())
        .handler(Box::new(recorder.clone()))
        .stop_signal(stop.clone())
        .build()
        .await
        .unwrap();

    let handle = tokio::spawn(async move {
        let result = listen(&mut listener).await;
        (listener, result)
    });
    rx.recv().await.unwrap();
    stop.stop("test");

    let (listener, result) = handle.await.unwrap();
    result.unwrap();
    assert_eq!(listener.state(), ListenerState::Stopped);
    assert_eq!(source.trailing_sent(), 20);
    assert!(recorder.seen().iter().all(|&n| n < 1000));
}

#[tokio::test]
async fn listener_runs_once() {
    let (recorder, _rx) = Recorder::new();
    let mut listener = Listener::builder()
        .source(Arc::new(ScriptedSource::blocks([1])))
        .handler(Box::new(recorder))
        .end_block(1)
        .build()
        .await
        .unwrap();

    listen(&mut listener).await.unwrap();
    assert!(listener.listen().await.unwrap_err().is_config());
}

#[tokio::test]
async fn replay_with_cursor_resumes_where_it_left_off() {
    let dir = tempfile::tempdir().unwrap();
    let cursor: Arc<dyn CursorStore> = Arc::new(FileCursorStore::new(dir.path().join("cursor")));
    let blocks: Vec<_> = (1..=10).map(common::block).collect();

    // First session: blocks 1..=4.
    let (recorder, _rx) = Recorder::new();
    let chain: Box<dyn BlockHandler> =
        Box::new(CursorWriter::new(Some(Box::new(recorder.clone())), cursor.clone()));
    let mut listener = Listener::builder()
        .source(Arc::new(ReplaySource::new(blocks.clone()).with_buffer(2)))
        .handler(chain)
        .start_block(1)
        .end_block(4)
        .resume_from(cursor.clone())
        .build()
        .await
        .unwrap();
    listen(&mut listener).await.unwrap();
    assert_eq!(recorder.seen(), vec![1, 2, 3, 4]);
    assert_eq!(cursor.load().await.unwrap(), Some(4));

    // Second session resumes at the saved block.
    let (recorder, _rx) = Recorder::new();
    let chain: Box<dyn BlockHandler> =
        Box::new(CursorWriter::new(Some(Box::new(recorder.clone())), cursor.clone()));
    let mut listener = Listener::builder()
        .source(Arc::new(ReplaySource::new(blocks)))
        .handler(chain)
        .end_block(6)
        .resume_from(cursor.clone())
        .build()
        .await
        .unwrap();
    assert_eq!(listener.start_block(), Some(4));
    listen(&mut listener).await.unwrap();
    assert_eq!(recorder.seen(), vec![4, 5, 6]);
    assert_eq!(cursor.load().await.unwrap(), Some(6));
}

#[tokio::test]
async fn cursor_reflects_block_whose_handling_failed() {
    let cursor = Arc::new(MemoryCursorStore::new());
    let (recorder, _rx) = Recorder::new();
    let chain = CursorWriter::new(Some(Box::new(recorder.failing_at(3))), cursor.clone());

    let mut listener = Listener::builder()
        .source(Arc::new(ScriptedSource::blocks(1..=5)))
        .handler(Box::new(chain))
        .build()
        .await
        .unwrap();

    assert!(listen(&mut listener).await.is_err());
    assert_eq!(cursor.get(), Some(3));
}

#[tokio::test]
async fn replay_without_start_only_sees_newest() {
    let (recorder, mut rx) = Recorder::new();
    let stop = StopSignal::new();
    let source = Arc::new(ReplaySource::new((1..=3).map(common::block).collect()));

    let mut listener = Listener::builder()
        .source(source.clone())
        .handler(Box::new(recorder.clone()))
        .stop_signal(stop.clone())
        .build()
        .await
        .unwrap();

    let task = tokio::spawn(async move { listen(&mut listener).await });
    assert_eq!(rx.recv().await, Some(3));
    stop.stop("done");
    task.await.unwrap().unwrap();

    assert_eq!(recorder.seen(), vec![3]);
    assert_eq!(source.active_registrations(), 0);
}
