use serde_json::json;

use cast_lounge_rs::{
    extract_session_fields, extract_session_token, extract_video_id, AppProfile, AppStatus,
    CastError, MediaStatus, PhaseSet, PlaybackPhase, QueueCommand, Readiness, Screen,
    ScreensResponse, StreamResolver, StreamType, YoutubeIdResolver, BACKDROP_APP_ID,
    DASHCAST_APP_ID, DEFAULT_MEDIA_RECEIVER_ID, YOUTUBE_APP_ID,
};

// Test Screen model deserialization
#[test]
fn test_screen_model() {
    let json_data = json!({
        "screenId": "test_screen_id",
        "loungeToken": "test_lounge_token",
        "name": "Test Screen"
    });

    let screen: Screen = serde_json::from_value(json_data).unwrap();

    assert_eq!(screen.screen_id, "test_screen_id");
    assert_eq!(screen.lounge_token, "test_lounge_token");
    assert_eq!(screen.name, Some("Test Screen".to_string()));

    let response: ScreensResponse =
        serde_json::from_str(r#"{"screens":[{"screenId":"S1","loungeToken":"LT1"}]}"#).unwrap();
    assert_eq!(response.screens.len(), 1);
    assert_eq!(response.screens[0].name, None);
}

// Test MediaStatus deserialization from a receiver payload
#[test]
fn test_media_status_model() {
    let json_data = json!({
        "playerState": "PLAYING",
        "contentId": "http://example.com/a.mp4",
        "contentType": "video/mp4",
        "streamType": "BUFFERED",
        "duration": 180.0,
        "currentTime": 42.5
    });
    let status: MediaStatus = serde_json::from_value(json_data).unwrap();

    assert_eq!(status.player_state, PlaybackPhase::Playing);
    assert_eq!(status.stream_type, Some(StreamType::Buffered));
    assert_eq!(status.current_time, 42.5);
    assert!(status.is_seekable());
    assert!(status.is_audiovideo());
    assert!(!status.is_partial());

    // Unrecognised values fall back instead of failing
    let status: MediaStatus =
        serde_json::from_value(json!({"playerState": "LOADING", "streamType": "NONE"})).unwrap();
    assert_eq!(status.player_state, PlaybackPhase::Unknown);
    assert_eq!(status.stream_type, Some(StreamType::Other));
    assert_eq!(
        serde_json::to_string(&PlaybackPhase::Unknown).unwrap(),
        r#""UNKNOWN""#
    );
}

#[test]
fn test_seekable_needs_finite_buffered_stream() {
    let live = MediaStatus {
        stream_type: Some(StreamType::Live),
        duration: Some(100.0),
        ..Default::default()
    };
    assert!(!live.is_seekable());

    let endless = MediaStatus {
        stream_type: Some(StreamType::Buffered),
        duration: Some(f64::INFINITY),
        ..Default::default()
    };
    assert!(!endless.is_seekable());

    let unknown_length = MediaStatus {
        stream_type: Some(StreamType::Buffered),
        ..Default::default()
    };
    assert!(!unknown_length.is_seekable());
}

#[test]
fn test_partial_and_image_status() {
    let partial = MediaStatus {
        content_id: Some("x".to_string()),
        ..Default::default()
    };
    assert!(partial.is_partial());

    let image = MediaStatus {
        content_id: Some("x".to_string()),
        content_type: Some("image/png".to_string()),
        ..Default::default()
    };
    assert!(!image.is_partial());
    assert!(!image.is_audiovideo());
}

#[test]
fn test_app_status_model() {
    let status: AppStatus = serde_json::from_value(json!({
        "appId": YOUTUBE_APP_ID,
        "statusText": "YouTube",
        "namespaces": ["urn:x-cast:com.google.cast.media"],
        "volumeLevel": 0.4
    }))
    .unwrap();
    assert_eq!(status.app_id.as_deref(), Some(YOUTUBE_APP_ID));
    assert!(status.supports_namespace("urn:x-cast:com.google.cast.media"));
    assert!(!status.volume_muted);
}

#[test]
fn test_phase_parsing() {
    assert_eq!("PAUSED".parse::<PlaybackPhase>().unwrap(), PlaybackPhase::Paused);
    assert!(matches!(
        "paused".parse::<PlaybackPhase>(),
        Err(CastError::InvalidWait(_))
    ));

    let set = PhaseSet::parse(&["BUFFERING", "PLAYING"]).unwrap();
    assert!(set.contains(PlaybackPhase::Playing));
    assert!(!set.contains(PlaybackPhase::Idle));

    let inverted = set.complement();
    assert_eq!(
        inverted.iter().collect::<Vec<_>>(),
        vec![
            PlaybackPhase::Unknown,
            PlaybackPhase::Idle,
            PlaybackPhase::Paused
        ]
    );
    assert!(PhaseSet::all().complement().is_empty());
    assert!(PhaseSet::parse(&["PLAYING", "bogus"]).is_err());
}

#[test]
fn test_queue_command_payloads() {
    let add = QueueCommand::AddVideo {
        video_id: "dQw4w9WgXcQ".to_string(),
    };
    let body = serde_urlencoded::to_string(add.form_fields(4)).unwrap();
    assert_eq!(body, "count=1&ofs=4&req0__sc=addVideo&req0_videoId=dQw4w9WgXcQ");

    let body = serde_urlencoded::to_string(QueueCommand::ClearPlaylist.form_fields(1)).unwrap();
    assert_eq!(body, "count=1&ofs=1&req0__sc=clearPlaylist");
}

#[test]
fn test_extract_session_fields() {
    let body = r#"[[0,["c","SID1","",8]],[1,["S","GS1"]],[2,["playlistModified",{"listId":"PL1","firstVideoId":"vid"}]]]"#;
    let fields = extract_session_fields(body);
    assert_eq!(fields.sid.as_deref(), Some("SID1"));
    assert_eq!(fields.gsession_id.as_deref(), Some("GS1"));
    assert_eq!(fields.playlist_id.as_deref(), Some("PL1"));
    assert_eq!(fields.first_video_id.as_deref(), Some("vid"));
    assert_eq!(fields.required(), Ok(("SID1".to_string(), "GS1".to_string())));

    // Each field stands alone; missing ones are absent, not errors
    let fields = extract_session_fields(r#"[[0,["c","SID1"]],[2,{"listId":""}]]"#);
    assert_eq!(fields.sid.as_deref(), Some("SID1"));
    assert_eq!(fields.gsession_id, None);
    assert_eq!(fields.playlist_id, None);
    assert_eq!(fields.required(), Err("gsessionid"));
}

#[test]
fn test_extract_session_token() {
    let page = r#"<script>ytcfg.set({"XSRF_TOKEN":"QUFFLUhqbG","VISITOR":"x"})</script>"#;
    assert_eq!(extract_session_token(page).as_deref(), Some("QUFFLUhqbG"));
    assert_eq!(extract_session_token("<html></html>"), None);
}

#[test]
fn test_video_id_resolution() {
    assert_eq!(extract_video_id("dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    assert_eq!(
        extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").as_deref(),
        Some("dQw4w9WgXcQ")
    );
    assert_eq!(
        extract_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(),
        Some("dQw4w9WgXcQ")
    );
    assert_eq!(
        extract_video_id("https://www.youtube.com/shorts/dQw4w9WgXcQ").as_deref(),
        Some("dQw4w9WgXcQ")
    );
    assert_eq!(extract_video_id("https://example.com/video.mp4"), None);

    let resolver = YoutubeIdResolver;
    assert!(matches!(
        resolver.resolve("too-short"),
        Err(CastError::PreconditionFailed(_))
    ));
}

#[test]
fn test_app_lookup() {
    let app = AppProfile::lookup("youtube", true).unwrap();
    assert_eq!(app.app_id, YOUTUBE_APP_ID);
    assert!(app.queue_capable);

    let app = AppProfile::lookup(DASHCAST_APP_ID, true).unwrap();
    assert_eq!(app.name, "dashcast");
    assert!(matches!(app.readiness, Readiness::StatusText(_)));
    assert!(app.force_launch);

    let app = AppProfile::lookup("nonexistent", false).unwrap();
    assert_eq!(app.app_id, DEFAULT_MEDIA_RECEIVER_ID);
    assert!(matches!(
        AppProfile::lookup("nonexistent", true),
        Err(CastError::PreconditionFailed(_))
    ));
}

#[test]
fn test_idle_predicates() {
    let app = AppStatus {
        app_id: Some(DEFAULT_MEDIA_RECEIVER_ID.to_string()),
        ..Default::default()
    };
    let idle = MediaStatus {
        player_state: PlaybackPhase::Idle,
        ..Default::default()
    };
    let playing = MediaStatus {
        player_state: PlaybackPhase::Playing,
        ..Default::default()
    };

    let default = AppProfile::default_receiver();
    assert!(default.is_idle(&app, &idle));
    assert!(!default.is_idle(&app, &playing));
    assert!(!AppProfile::dashcast().is_idle(&app, &idle));

    // Without the media namespace nothing counts as playing
    let by_namespace = default.with_idle(cast_lounge_rs::idle_without_media_namespace);
    assert!(by_namespace.is_idle(&app, &playing));

    assert!(cast_lounge_rs::is_inactive(&AppStatus::default()));
    assert!(cast_lounge_rs::is_inactive(&AppStatus {
        app_id: Some(BACKDROP_APP_ID.to_string()),
        ..Default::default()
    }));
    assert!(!cast_lounge_rs::is_inactive(&app));
}
