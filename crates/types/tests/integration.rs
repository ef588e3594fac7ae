//! Integration tests for types

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use upd_types::*;

    #[test]
    fn test_descriptor_json_round_trip() {
        let descriptor = PluginDescriptor::new("apt")
            .with_phases(PhaseSet::all())
            .with_resources(Phase::Download, ["apt-lists"])
            .with_resources(Phase::Execute, ["dpkg-lock", "apt-lists"])
            .with_sudo();

        let json = serde_json::to_string(&descriptor).unwrap();
        let back: PluginDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
        assert!(back.resources_for(Phase::Execute).contains("dpkg-lock"));
    }

    #[test]
    fn test_state_serialization() {
        let state = PipelineState::DownloadDone;
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#""download_done""#);

        let deserialized: PipelineState = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, state);
    }

    #[test]
    fn test_run_report_serialization() {
        let mut phase_metrics = BTreeMap::new();
        phase_metrics.insert(
            Phase::Execute,
            PhaseSnapshot {
                wall_clock_ms: 1_200,
                cpu_seconds: 2.5,
                bytes_transferred: 4_096,
                peak_memory: 1 << 20,
            },
        );
        let pipelines = vec![PipelineReport {
            plugin: "apt".into(),
            state: PipelineState::Completed,
            outcomes: vec![PhaseOutcome {
                phase: Phase::Execute,
                status: PhaseStatus::Success,
                summary: "exit code 0".into(),
            }],
            phase_metrics,
            failure: None,
            recent_output: Vec::new(),
            duration_ms: 1_500,
        }];
        let report = RunReport {
            run_id: uuid::Uuid::new_v4(),
            classification: RunReport::classify(&pipelines),
            pipelines,
            cancelled: false,
            duration_ms: 1_500,
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""classification":"success""#));
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pipelines[0].plugin, "apt");
        assert_eq!(back.pipelines[0].phase_metrics[&Phase::Execute].cpu_seconds, 2.5);
    }

    #[test]
    fn test_phase_set_from_iterator() {
        let set: PhaseSet = [Phase::Check, Phase::Execute].into_iter().collect();
        assert!(set.contains(Phase::Check));
        assert!(!set.contains(Phase::Download));
        assert_eq!(set.iter().count(), 2);
    }
}
