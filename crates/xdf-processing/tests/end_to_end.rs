use anyhow::Result;
use xdf_core::{Recording, StreamDescriptor, TimeBase, Trial};
use xdf_processing::{
    AlignmentEngine, ClassificationRuleSet, PairingStatus, ProcessingSession,
};
use xdf_simulation::{default_recording, RecordingSimulator, ScenarioConfig, TrialScript};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn duplicate_trial_end_on_redundant_streams() -> Result<()> {
    init_tracing();

    let recording = Recording::new(vec![
        StreamDescriptor::markers(
            "UnityMarkers",
            "Markers",
            &[(100.0, "TRIAL_END:1:time=100.0:duration=10.0")],
        )?,
        StreamDescriptor::markers(
            "UnityMarkers_backup",
            "Markers",
            &[(100.0001, "TRIAL_END:1:time=100.0:duration=10.0")],
        )?,
    ]);

    let bundle = AlignmentEngine::default().process(&recording)?;
    assert_eq!(bundle.events.len(), 1);
    assert_eq!(
        bundle.trials,
        vec![Trial {
            onset: 90.0,
            duration: 10.0,
            trial_type: "trial_1".to_string(),
            trial_number: 1,
        }]
    );
    // no data streams to align
    assert!(bundle.time_window.degraded);
    Ok(())
}

#[test]
fn simulated_session_is_reconstructed() -> Result<()> {
    init_tracing();

    let simulated = default_recording()?;
    let bundle = AlignmentEngine::default().process(&simulated.recording)?;

    assert_eq!(bundle.roles(), vec!["wii", "kinect", "stimulus"]);
    assert_eq!(bundle.events.len(), simulated.script.markers.len());
    assert!(bundle.events.iter().all(|e| e.source == "UnityMarkers"));
    assert!(bundle.events.windows(2).all(|w| w[0].onset <= w[1].onset));
    assert_eq!(bundle.meta.len(), simulated.script.meta.len());
    assert_eq!(
        &bundle.meta_columns[..5],
        &["onset", "duration", "trial_name", "trial_type", "has_perturbations"]
    );

    assert_eq!(bundle.trials.len(), simulated.script.trials.len());
    for (trial, scripted) in bundle.trials.iter().zip(simulated.script.trials.iter()) {
        assert_eq!(trial.trial_number, scripted.trial_number);
        assert!((trial.onset - scripted.onset).abs() < 1e-6);
        assert!((trial.duration - scripted.duration).abs() < 1e-6);
    }

    assert_eq!(bundle.perturbation_status, PairingStatus::Matched);
    assert_eq!(bundle.perturbations.len(), simulated.script.perturbations.len());
    for (p, scripted) in bundle.perturbations.iter().zip(simulated.script.perturbations.iter()) {
        assert!((p.onset - scripted.onset).abs() < 1e-6);
        assert!((p.duration - scripted.duration).abs() < 1e-6);
    }

    let (start, end) = ScenarioConfig::default().expected_window().unwrap_or_default();
    assert!((bundle.time_window.start - start).abs() < 1e-9);
    assert!((bundle.time_window.end - end).abs() < 1e-9);
    assert!(!bundle.is_degraded());

    for stream in &bundle.streams {
        assert!(stream.timestamps.iter().all(|t| bundle.time_window.contains(*t)));
        assert!(stream.metadata.monotonic);
    }
    let wii = bundle.stream("wii").unwrap();
    assert_eq!(wii.metadata.channel_labels[0], "top_left");
    assert!((wii.metadata.effective_srate - 100.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn missing_perturbation_end_is_padded() -> Result<()> {
    init_tracing();

    let mut config = ScenarioConfig::default();
    config.script = TrialScript {
        drop_last_perturbation_end: true,
        ..TrialScript::default()
    };
    let simulated = RecordingSimulator::new(config)?.generate()?;
    let bundle = AlignmentEngine::default().process(&simulated.recording)?;

    assert_eq!(bundle.perturbation_status, PairingStatus::PaddedOrphanStart);
    assert_eq!(bundle.perturbations.len(), 6);
    let last = bundle.perturbations.last().unwrap();
    assert_eq!(last.duration, 0.0);
    assert!(bundle.is_degraded());
    Ok(())
}

#[test]
fn relative_export_leaves_absolute_bundle_intact() -> Result<()> {
    init_tracing();

    let simulated = default_recording()?;
    let absolute = AlignmentEngine::default().process(&simulated.recording)?;
    let snapshot = absolute.clone();
    let relative = absolute.to_relative()?;

    assert_eq!(absolute, snapshot);
    assert_eq!(relative.time_base, TimeBase::Relative { global_t0: absolute.global_t0 });
    assert_eq!(relative.streams[0].timestamps[0], 0.0);
    assert!((relative.trials[0].onset - 4.0).abs() < 1e-6);

    let restored = relative.to_absolute();
    for (a, b) in absolute.events.iter().zip(restored.events.iter()) {
        assert!((a.onset - b.onset).abs() < 1e-9);
    }
    assert!(relative.timing_info().use_relative_time);
    Ok(())
}

#[test]
fn session_tracks_time_origin() -> Result<()> {
    init_tracing();

    let mut session = ProcessingSession::new(AlignmentEngine::default());
    session.load(default_recording()?.recording);
    let bundle = session.process()?;

    let relative = session.to_relative_times(&[bundle.global_t0, bundle.global_t0 + 2.5])?;
    assert_eq!(relative, vec![0.0, 2.5]);
    Ok(())
}

#[test]
fn disjoint_data_streams_degrade_the_window() -> Result<()> {
    init_tracing();

    let recording = Recording::new(vec![
        StreamDescriptor::numeric("wii_board", "MoCap", 1.0, vec![0.0, 5.0], vec![vec![0.0]; 2])?,
        StreamDescriptor::numeric("kinect", "MoCap", 1.0, vec![6.0, 10.0], vec![vec![0.0]; 2])?,
    ]);
    let bundle = AlignmentEngine::default().process(&recording)?;

    assert!(bundle.time_window.degraded);
    assert_eq!((bundle.time_window.start, bundle.time_window.end), (0.0, 10.0));
    assert_eq!(bundle.streams.len(), 2);
    assert_eq!(bundle.global_t0, 0.0);
    Ok(())
}

#[test]
fn malformed_markers_do_not_abort() -> Result<()> {
    init_tracing();

    let recording = Recording::new(vec![StreamDescriptor::markers(
        "EventMarkers",
        "Markers",
        &[
            (1.0, ":::"),
            (2.0, ""),
            (3.0, "TRIAL_END:x:duration=abc"),
            (4.0, "=5"),
            (5.0, "PERTURBATION_END"),
        ],
    )?]);
    let bundle = AlignmentEngine::default().process(&recording)?;

    assert_eq!(bundle.events.len(), 4);
    assert!(bundle.trials.is_empty());
    assert!(bundle.perturbations.is_empty());
    assert_eq!(
        bundle.perturbation_status,
        PairingStatus::CountMismatch { starts: 0, ends: 1 }
    );
    Ok(())
}

#[test]
fn rule_set_from_json_drives_classification() -> Result<()> {
    init_tracing();

    let json = r#"[
        {"role": "marker", "names": ["unity"], "types": ["markers"], "mode": "pattern"},
        {"role": "meta", "names": ["trial_meta"], "types": ["markers"], "mode": "pattern"},
        {"role": "balance", "names": ["wii_board"], "types": ["mocap"], "mode": "exact"}
    ]"#;
    let rules = ClassificationRuleSet::from_json(json)?;
    let engine = AlignmentEngine::builder().rules(rules).build()?;

    let bundle = engine.process(&default_recording()?.recording)?;
    assert_eq!(bundle.roles(), vec!["balance", "data", "data_2"]);
    assert_eq!(bundle.trials.len(), 3);
    Ok(())
}
