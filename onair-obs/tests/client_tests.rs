mod support;

use std::time::Duration;

use futures_util::SinkExt;
use onair_obs::{ItemPosition, ObsClient, ObsError};
use rand::seq::SliceRandom;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn concurrent_requests_resolve_to_their_own_response() {
    const N: usize = 50;
    let (listener, port) = support::listener().await;

    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        let mut requests = Vec::with_capacity(N);
        while requests.len() < N {
            requests.push(support::read_request(&mut ws).await.expect("request"));
        }
        requests.shuffle(&mut rand::rng());
        for request in &requests {
            let n = request["requestData"]["n"].clone();
            ws.send(support::ok_response(request, json!({ "n": n })))
                .await
                .expect("send response");
        }
        ws
    });

    let client = ObsClient::new(support::config(port));
    assert_ok!(client.connect().await);
    assert!(client.is_connected());

    let mut calls = Vec::new();
    for n in 0..N {
        let client = client.clone();
        calls.push(tokio::spawn(async move {
            (n, client.request("Echo", Some(json!({ "n": n }))).await)
        }));
    }
    for call in calls {
        let (n, result) = call.await.unwrap();
        let data = result.expect("echo response");
        assert_eq!(data["n"], json!(n));
    }
    assert_eq!(client.pending_requests(), 0);

    let _ws = server.await.unwrap();
    client.close().await.unwrap();
}

async fn drop_with_pending(k: usize) {
    let (listener, port) = support::listener().await;

    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        for _ in 0..k {
            support::read_request(&mut ws).await.expect("request");
        }
        drop(ws);
    });

    let client = ObsClient::new(support::config(port));
    client.connect().await.unwrap();

    let mut calls = Vec::new();
    for n in 0..k {
        let client = client.clone();
        calls.push(tokio::spawn(async move {
            client.request("NeverAnswered", Some(json!({ "n": n }))).await
        }));
    }

    let results = timeout(Duration::from_secs(3), async {
        let mut out = Vec::new();
        for call in calls {
            out.push(call.await.unwrap());
        }
        out
    })
    .await
    .expect("pending requests must not hang after a drop");

    assert_eq!(results.len(), k);
    for result in results {
        match result {
            Err(ObsError::ConnectionClosed) | Err(ObsError::NotConnected) => {}
            other => panic!("expected a connection error, got {:?}", other),
        }
    }

    server.await.unwrap();
    timeout(Duration::from_secs(3), async {
        while client.is_connected() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client notices the drop");
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn drop_without_pending_requests_marks_disconnected() {
    drop_with_pending(0).await;
}

#[tokio::test]
async fn drop_fails_single_pending_request() {
    drop_with_pending(1).await;
}

#[tokio::test]
async fn drop_fails_hundred_pending_requests() {
    drop_with_pending(100).await;
}

#[tokio::test]
async fn rejected_request_carries_server_comment() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        let request = support::read_request(&mut ws).await.unwrap();
        ws.send(support::failed_response(&request, 601, "Scene does not exist"))
            .await
            .unwrap();
        ws
    });

    let client = ObsClient::new(support::config(port));
    client.connect().await.unwrap();

    let err = client.set_current_program_scene("MISSING").await.unwrap_err();
    match &err {
        ObsError::RequestFailed {
            request_type,
            code,
            comment,
        } => {
            assert_eq!(request_type, "SetCurrentProgramScene");
            assert_eq!(*code, 601);
            assert_eq!(comment.as_deref(), Some("Scene does not exist"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn request_while_disconnected_fails_fast() {
    let client = ObsClient::new(support::config(1));
    assert!(matches!(
        client.request("GetVersion", None).await,
        Err(ObsError::NotConnected)
    ));
}

#[tokio::test]
async fn connect_to_dead_port_is_a_connection_error() {
    let (listener, port) = support::listener().await;
    drop(listener);
    let client = ObsClient::new(support::config(port));
    let err = assert_err!(client.connect().await);
    assert!(matches!(err, ObsError::ConnectionError(_)));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn password_handshake_sends_expected_authentication() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        support::accept_with_password(&listener, "hunter2").await
    });

    let mut config = support::config(port);
    config.password = Some("hunter2".to_string());
    config.use_password = true;
    let client = ObsClient::new(config);
    assert_ok!(client.connect().await);

    let _ws = server.await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn challenge_without_password_fails_authentication() {
    let (listener, port) = support::listener().await;
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let challenge = onair_obs::protocol::AuthChallenge {
            challenge: "abc".into(),
            salt: "def".into(),
        };
        ws.send(support::hello(Some(&challenge))).await.unwrap();
        let _ = support::read_frame(&mut ws).await;
    });

    let client = ObsClient::new(support::config(port));
    assert!(matches!(
        client.connect().await,
        Err(ObsError::AuthenticationFailed)
    ));
}

#[tokio::test]
async fn visibility_resolves_scene_item_id_first() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;

        let lookup = support::read_request(&mut ws).await.unwrap();
        assert_eq!(lookup["requestType"], "GetSceneItemId");
        assert_eq!(lookup["requestData"]["sceneName"], "MIKROFONY");
        assert_eq!(lookup["requestData"]["sourceName"], "Mic1");
        ws.send(support::ok_response(&lookup, json!({ "sceneItemId": 42 })))
            .await
            .unwrap();

        let toggle = support::read_request(&mut ws).await.unwrap();
        assert_eq!(toggle["requestType"], "SetSceneItemEnabled");
        assert_eq!(toggle["requestData"]["sceneItemId"], 42);
        assert_eq!(toggle["requestData"]["sceneItemEnabled"], false);
        ws.send(support::ok_response(&toggle, json!(null))).await.unwrap();
        ws
    });

    let client = ObsClient::new(support::config(port));
    client.connect().await.unwrap();
    assert_ok!(client.set_source_visibility("MIKROFONY", "Mic1", false).await);
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn unknown_source_is_reported_as_scene_item_not_found() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        let lookup = support::read_request(&mut ws).await.unwrap();
        ws.send(support::failed_response(&lookup, 600, "No scene items were found"))
            .await
            .unwrap();
        ws
    });

    let client = ObsClient::new(support::config(port));
    client.connect().await.unwrap();
    let err = client
        .set_scene_item_index("MEDIA", "Ghost", ItemPosition::Bottom)
        .await
        .unwrap_err();
    match err {
        ObsError::SceneItemNotFound {
            scene, source_name, ..
        } => {
            assert_eq!(scene, "MEDIA");
            assert_eq!(source_name, "Ghost");
        }
        other => panic!("unexpected error {:?}", other),
    }
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn move_to_top_uses_highest_index() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        let lookup = support::read_request(&mut ws).await.unwrap();
        ws.send(support::ok_response(&lookup, json!({ "sceneItemId": 7 })))
            .await
            .unwrap();

        let list = support::read_request(&mut ws).await.unwrap();
        assert_eq!(list["requestType"], "GetSceneItemList");
        let items: Vec<_> = (0..3)
            .map(|i| json!({"sceneItemId": i + 5, "sceneItemIndex": i, "sourceName": format!("S{}", i)}))
            .collect();
        ws.send(support::ok_response(&list, json!({ "sceneItems": items })))
            .await
            .unwrap();

        let set = support::read_request(&mut ws).await.unwrap();
        assert_eq!(set["requestType"], "SetSceneItemIndex");
        assert_eq!(set["requestData"]["sceneItemId"], 7);
        assert_eq!(set["requestData"]["sceneItemIndex"], 2);
        ws.send(support::ok_response(&set, json!(null))).await.unwrap();
        ws
    });

    let client = ObsClient::new(support::config(port));
    client.connect().await.unwrap();
    assert_ok!(
        client
            .set_scene_item_index("MEDIA", "S2", ItemPosition::Top)
            .await
    );
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn playlist_is_sent_as_vlc_settings() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        let request = support::read_request(&mut ws).await.unwrap();
        ws.send(support::ok_response(&request, json!(null))).await.unwrap();
        (ws, request)
    });

    let client = ObsClient::new(support::config(port));
    client.connect().await.unwrap();
    client
        .set_playlist("Media2", vec!["/media/a.mp4".into(), "/media/b.mp4".into()])
        .await
        .unwrap();

    let (_ws, request) = server.await.unwrap();
    assert_eq!(request["requestType"], "SetInputSettings");
    let data = &request["requestData"];
    assert_eq!(data["inputName"], "Media2");
    assert_eq!(data["inputSettings"]["playlist"][0]["value"], "/media/a.mp4");
    assert_eq!(data["inputSettings"]["playlist"][1]["value"], "/media/b.mp4");
    assert_eq!(data["inputSettings"]["loop"], false);
    assert_eq!(data["inputSettings"]["shuffle"], false);
}

#[tokio::test]
async fn failing_handlers_do_not_stop_event_dispatch() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        ws.send(support::event("Boom", json!({}))).await.unwrap();
        ws.send(support::event("Panic", json!({}))).await.unwrap();
        for db in [-10.0, -12.5, -3.0] {
            ws.send(support::event(
                "InputVolumeChanged",
                json!({"inputName": "Mic1", "inputVolumeMul": 0.5, "inputVolumeDb": db}),
            ))
            .await
            .unwrap();
        }
        let request = support::read_request(&mut ws).await.unwrap();
        ws.send(support::ok_response(&request, json!({"alive": true})))
            .await
            .unwrap();
        ws
    });

    let client = ObsClient::new(support::config(port));
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_event("Boom", |_event| async { Err(anyhow::anyhow!("handler blew up")) });
    client.on_event("Panic", |event| async move {
        if event.event_type == "Panic" {
            panic!("handler panicked");
        }
        Ok(())
    });
    client.on_event("InputVolumeChanged", move |event| {
        let tx = tx.clone();
        async move {
            let body: onair_obs::InputVolumeChanged = event.data()?;
            tx.send(body.input_volume_db)?;
            Ok(())
        }
    });
    client.connect().await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let db = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("volume event")
            .unwrap();
        seen.push(db);
    }
    assert_eq!(seen, vec![-10.0, -12.5, -3.0]);

    let alive = client.request("GetStats", None).await.unwrap();
    assert_eq!(alive["alive"], true);
    assert!(client.is_connected());
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn handler_can_issue_its_own_request() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        ws.send(support::event("CurrentProgramSceneChanged", json!({"sceneName": "MEDIA"})))
            .await
            .unwrap();
        let request = support::read_request(&mut ws).await.unwrap();
        assert_eq!(request["requestType"], "GetSceneList");
        ws.send(support::ok_response(&request, json!({"scenes": []})))
            .await
            .unwrap();
        ws
    });

    let mut config = support::config(port);
    config.request_timeout = Some(Duration::from_secs(2));
    let client = ObsClient::new(config);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handler_client = client.clone();
    client.on_event("CurrentProgramSceneChanged", move |_event| {
        let client = handler_client.clone();
        let tx = tx.clone();
        async move {
            let outcome = client.request("GetSceneList", None).await;
            tx.send(outcome)?;
            Ok(())
        }
    });
    client.connect().await.unwrap();

    let outcome = timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("handler finished")
        .unwrap();
    let scenes = assert_ok!(outcome);
    assert_eq!(scenes["scenes"], json!([]));
    assert_eq!(client.pending_requests(), 0);
    let _ws = server.await.unwrap();
}

#[tokio::test]
async fn reconnects_after_established_connection_drops() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let first = support::accept_identified(&listener).await;
        drop(first);
        let mut second = support::accept_identified(&listener).await;
        while let Some(request) = support::read_request(&mut second).await {
            second
                .send(support::ok_response(&request, json!({"generation": 2})))
                .await
                .unwrap();
        }
    });

    let mut config = support::config(port);
    config.reconnect = true;
    let client = ObsClient::new(config);
    client.connect().await.unwrap();

    let data = timeout(Duration::from_secs(5), async {
        loop {
            match client.request("GetVersion", None).await {
                Ok(data) => break data,
                Err(_) => sleep(Duration::from_millis(20)).await,
            }
        }
    })
    .await
    .expect("client reconnects");
    assert_eq!(data["generation"], 2);

    client.close().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn close_disables_reconnect() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        while support::read_frame(&mut ws).await.is_some() {}
        timeout(Duration::from_millis(300), listener.accept())
            .await
            .is_err()
    });

    let mut config = support::config(port);
    config.reconnect = true;
    let client = ObsClient::new(config);
    client.connect().await.unwrap();
    client.close().await.unwrap();
    assert!(!client.is_connected());

    let no_redial = server.await.unwrap();
    assert!(no_redial, "client dialled again after close()");
}

#[tokio::test]
async fn unanswered_request_times_out_and_is_forgotten() {
    let (listener, port) = support::listener().await;
    let server = tokio::spawn(async move {
        let mut ws = support::accept_identified(&listener).await;
        let _ignored = support::read_request(&mut ws).await;
        ws
    });

    let mut config = support::config(port);
    config.request_timeout = Some(Duration::from_millis(100));
    let client = ObsClient::new(config);
    client.connect().await.unwrap();

    let err = client.request("Slow", None).await.unwrap_err();
    assert!(matches!(err, ObsError::Timeout { .. }));
    assert_eq!(client.pending_requests(), 0);
    let _ws = server.await.unwrap();
}
