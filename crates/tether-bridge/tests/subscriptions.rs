use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tether_bridge::{
    Bridge, BridgeConfig, BridgeError, HostError, LocalHost, Subscription, SubscriptionState,
};
use tether_events::{
    AppServerEvent, AppServerEvents, AppServerMessage, ChannelName, DictationDownload,
    DictationDownloadProgress, DictationEvent, DictationEvents, DictationModelState,
    DictationModelStatus, DictationSessionState, TerminalOutput, TerminalOutputs, UpdaterCheck,
};
use tether_test_support::fixtures::{CallCounter, RecordingListener, terminal_output};
use tether_test_support::mocks::{CountingHost, DelayedAckHost, FailingHost};
use tokio::time::timeout;
use tokio_stream::StreamExt;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn every_channel_delivers_the_unwrapped_payload_once() -> anyhow::Result<()> {
    let host = LocalHost::new();
    let bridge = Bridge::new(host.clone());

    let app_server = RecordingListener::<AppServerEvent>::new();
    let downloads = RecordingListener::<DictationModelStatus>::new();
    let dictation = RecordingListener::<DictationEvent>::new();
    let terminal = RecordingListener::<TerminalOutput>::new();
    let updater = CallCounter::new();
    let _subscriptions = vec![
        bridge
            .subscribe_app_server_event(app_server.listener())
            .await?,
        bridge
            .subscribe_dictation_download(downloads.listener())
            .await?,
        bridge.subscribe_dictation_event(dictation.listener()).await?,
        bridge.subscribe_terminal_output(terminal.listener()).await?,
        bridge.subscribe_updater_check(updater.callback()).await?,
    ];

    let server_event = AppServerEvent {
        workspace_id: "ws-1".into(),
        message: AppServerMessage {
            id: None,
            method: "thread/started".into(),
            params: json!({"threadId": "th-1"}),
        },
    };
    let status = DictationModelStatus {
        state: DictationModelState::Downloading,
        model_id: "base.en".into(),
        progress: Some(DictationDownloadProgress {
            total_bytes: Some(1_000),
            downloaded_bytes: 250,
        }),
        error: None,
    };
    let dictation_event = DictationEvent::State {
        state: DictationSessionState::Listening,
    };
    let output = terminal_output("w1", "t1", "echo hi\n");

    assert_eq!(host.emit::<AppServerEvents>(&server_event)?, 1);
    assert_eq!(host.emit::<DictationDownload>(&status)?, 1);
    assert_eq!(host.emit::<DictationEvents>(&dictation_event)?, 1);
    assert_eq!(host.emit::<TerminalOutputs>(&output)?, 1);
    assert_eq!(host.emit::<UpdaterCheck>(&())?, 1);

    assert_eq!(app_server.payloads(), vec![server_event]);
    assert_eq!(downloads.payloads(), vec![status]);
    assert_eq!(dictation.payloads(), vec![dictation_event]);
    assert_eq!(terminal.payloads(), vec![output]);
    assert_eq!(updater.count(), 1);
    assert_eq!(bridge.stats().delivered, 5);
    Ok(())
}

#[tokio::test]
async fn terminal_output_scenario_matches_exactly() -> anyhow::Result<()> {
    let host = LocalHost::new();
    let bridge = Bridge::new(host.clone());
    let terminal = RecordingListener::<TerminalOutput>::new();
    let _subscription = bridge.subscribe_terminal_output(terminal.listener()).await?;

    host.emit_raw(
        ChannelName::TerminalOutput,
        json!({"workspaceId": "w1", "terminalId": "t1", "data": "ls\n"}),
    );

    assert_eq!(terminal.payloads(), vec![terminal_output("w1", "t1", "ls\n")]);
    Ok(())
}

#[tokio::test]
async fn updater_check_scenario_invokes_listener_once() -> anyhow::Result<()> {
    let host = LocalHost::new();
    let bridge = Bridge::new(host.clone());
    let updater = CallCounter::new();
    let _subscription = bridge.subscribe_updater_check(updater.callback()).await?;

    host.emit_raw(ChannelName::UpdaterCheck, serde_json::Value::Null);

    assert_eq!(updater.count(), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_subscription_receives_nothing_more() -> anyhow::Result<()> {
    let host = LocalHost::new();
    let bridge = Bridge::new(host.clone());
    let terminal = RecordingListener::<TerminalOutput>::new();
    let subscription = bridge.subscribe_terminal_output(terminal.listener()).await?;

    host.emit::<TerminalOutputs>(&terminal_output("w1", "t1", "before"))?;
    subscription.cancel();
    host.emit::<TerminalOutputs>(&terminal_output("w1", "t1", "after"))?;

    assert_eq!(subscription.state(), SubscriptionState::Cancelled);
    assert_eq!(terminal.payloads(), vec![terminal_output("w1", "t1", "before")]);
    Ok(())
}

#[tokio::test]
async fn double_cancel_deregisters_once() -> anyhow::Result<()> {
    let host = CountingHost::new();
    let bridge = Bridge::new(host.clone());
    let updater = CallCounter::new();
    let subscription = bridge.subscribe_updater_check(updater.callback()).await?;

    subscription.cancel();
    subscription.cancel();
    drop(subscription);

    assert_eq!(host.listens(), 1);
    assert_eq!(host.unlistens(), 1);
    assert_eq!(host.removed(), 1);
    Ok(())
}

#[tokio::test]
async fn subscriptions_on_one_channel_are_independent() -> anyhow::Result<()> {
    let host = CountingHost::new();
    let bridge = Bridge::new(host.clone());
    let first = RecordingListener::<DictationEvent>::new();
    let second = RecordingListener::<DictationEvent>::new();
    let first_subscription = bridge.subscribe_dictation_event(first.listener()).await?;
    let _second_subscription = bridge.subscribe_dictation_event(second.listener()).await?;
    assert_eq!(host.listens(), 2);

    first_subscription.cancel();
    host.host()
        .emit::<DictationEvents>(&DictationEvent::Transcript {
            text: "hello".into(),
        })?;

    assert!(first.is_empty());
    assert_eq!(
        second.payloads(),
        vec![DictationEvent::Transcript {
            text: "hello".into()
        }]
    );
    assert_eq!(
        host.host().listener_count(ChannelName::DictationEvent),
        1
    );
    Ok(())
}

#[tokio::test]
async fn failed_registration_yields_no_subscription() {
    let host = FailingHost::unreachable();
    let bridge = Bridge::new(host.clone());
    let terminal = RecordingListener::<TerminalOutput>::new();

    let result = bridge.subscribe_terminal_output(terminal.listener()).await;

    match result {
        Err(BridgeError::Registration {
            channel,
            source: HostError::Unreachable { .. },
        }) => assert_eq!(channel, ChannelName::TerminalOutput),
        other => panic!("expected registration failure, got {other:?}"),
    }
    assert_eq!(host.attempts(), 1);
    assert_eq!(host.removals(), 0);
    assert_eq!(bridge.stats().registered, 0);
}

#[tokio::test]
async fn rejected_registration_surfaces_reason() {
    let host = FailingHost::rejecting("capability denied");
    let bridge = Bridge::new(host);

    let result = bridge.subscribe_updater_check(|| {}).await;

    let Err(BridgeError::Registration {
        source: HostError::Rejected { channel, reason },
        ..
    }) = result
    else {
        panic!("expected rejected registration");
    };
    assert_eq!(channel, ChannelName::UpdaterCheck);
    assert_eq!(reason, "capability denied");
}

#[tokio::test]
async fn closed_host_leaves_no_registration_behind() {
    let host = LocalHost::new();
    host.close();
    let bridge = Bridge::new(host.clone());

    let result = bridge.subscribe_dictation_download(|_| {}).await;

    assert!(matches!(
        result,
        Err(BridgeError::Registration {
            source: HostError::Closed,
            ..
        })
    ));
    assert_eq!(host.listener_count(ChannelName::DictationDownload), 0);
}

#[tokio::test]
async fn abandoned_subscribe_leaves_no_live_listener() {
    let host = DelayedAckHost::new(Duration::from_millis(200));
    let bridge = Bridge::new(host.clone());
    let updater = CallCounter::new();

    let pending = timeout(
        Duration::from_millis(20),
        bridge.subscribe_updater_check(updater.callback()),
    )
    .await;
    assert!(pending.is_err(), "subscribe should still be pending");

    let invoked = host
        .host()
        .emit_raw(ChannelName::UpdaterCheck, serde_json::Value::Null);

    assert_eq!(invoked, 0);
    assert_eq!(updater.count(), 0);
    assert_eq!(host.host().listener_count(ChannelName::UpdaterCheck), 0);
    assert_eq!(host.acknowledged(), 0);
    assert_eq!(bridge.stats().registered, 0);
}

#[tokio::test]
async fn host_teardown_cancels_live_subscriptions() -> anyhow::Result<()> {
    let host = LocalHost::new();
    let bridge = Bridge::new(host.clone());
    let updater = CallCounter::new();
    let subscription = bridge.subscribe_updater_check(updater.callback()).await?;
    let mut stream = bridge.stream::<TerminalOutputs>().await?;
    assert_eq!(subscription.state(), SubscriptionState::Active);

    host.close();

    assert_eq!(subscription.state(), SubscriptionState::Cancelled);
    assert!(!stream.subscription().is_active());
    assert_eq!(timeout(RECV_TIMEOUT, stream.next()).await?, None);
    assert_eq!(host.emit_raw(ChannelName::UpdaterCheck, serde_json::Value::Null), 0);
    assert_eq!(updater.count(), 0);

    subscription.cancel();
    assert_eq!(bridge.stats().cancelled, 0);
    Ok(())
}

#[tokio::test]
async fn listener_may_cancel_its_own_subscription() -> anyhow::Result<()> {
    let host = LocalHost::new();
    let bridge = Bridge::new(host.clone());
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let updater = CallCounter::new();

    let subscription = {
        let slot = Arc::clone(&slot);
        let callback = updater.callback();
        bridge
            .subscribe_updater_check(move || {
                callback();
                if let Some(subscription) = slot
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .as_ref()
                {
                    subscription.cancel();
                }
            })
            .await?
    };
    *slot
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(subscription);

    host.emit::<UpdaterCheck>(&())?;
    host.emit::<UpdaterCheck>(&())?;

    assert_eq!(updater.count(), 1);
    assert_eq!(host.listener_count(ChannelName::UpdaterCheck), 0);
    Ok(())
}

#[tokio::test]
async fn dispatcher_feeds_payload_streams_in_order() -> anyhow::Result<()> {
    let config = BridgeConfig::default();
    let host = LocalHost::new();
    let bridge = Bridge::new(host.clone());
    let (sender, dispatcher) = host.spawn_dispatcher(config.dispatcher_capacity);
    let mut stream = bridge.stream::<TerminalOutputs>().await?;

    for chunk in ["one", "two", "three"] {
        sender
            .send::<TerminalOutputs>(&terminal_output("w1", "t1", chunk))
            .await?;
    }

    let received: Vec<_> = timeout(RECV_TIMEOUT, (&mut stream).take(3).collect::<Vec<_>>()).await?;
    let chunks: Vec<String> = received.into_iter().map(|output| output.data).collect();
    assert_eq!(chunks, vec!["one", "two", "three"]);

    drop(stream);
    assert_eq!(host.listener_count(ChannelName::TerminalOutput), 0);

    drop(sender);
    dispatcher.await?;
    Ok(())
}

#[tokio::test]
async fn malformed_envelopes_do_not_interrupt_delivery() -> anyhow::Result<()> {
    let host = LocalHost::new();
    let bridge = Bridge::new(host.clone());
    let mut stream = bridge.stream::<DictationDownload>().await?;

    host.emit_raw(ChannelName::DictationDownload, json!({"state": "exploded"}));
    host.emit_raw(
        ChannelName::DictationDownload,
        json!({"state": "error", "modelId": "base.en", "error": "disk full"}),
    );

    let status = timeout(RECV_TIMEOUT, stream.next()).await?;
    assert_eq!(
        status,
        Some(DictationModelStatus {
            state: DictationModelState::Error,
            model_id: "base.en".into(),
            progress: None,
            error: Some("disk full".into()),
        })
    );
    assert_eq!(bridge.stats().malformed, 1);
    Ok(())
}
