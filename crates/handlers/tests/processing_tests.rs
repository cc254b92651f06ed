//! Integration tests for the follow-up processing rules (`PROCESSING` events).

use assert_matches::assert_matches;

use mimas_core::projection::{command_line, command_lines};
use mimas_core::records::{
    AnomalousScatterer, IspybJobInvocation, PdbModel, ProcessingInputs, SpaceGroup, Sweep,
};
use mimas_core::registry::CloudburstRule;
use mimas_core::types::{DcClass, DetectorClass, Event, Target};
use mimas_core::{CoreError, DispatchContext, Invocation, Scenario, Specification};
use mimas_handlers::default_registry;

const DCID: i64 = 6061343;

fn results() -> ProcessingInputs {
    ProcessingInputs {
        mtz: Some("/dls/i03/data/processed/scaled.mtz".to_string()),
        scaled_unmerged_mtz: Some("/dls/i03/data/processed/unmerged.mtz".to_string()),
        scaling_id: Some(123456),
        program_id: Some(98765),
        tag: Some("xia2 dials".to_string()),
        ..Default::default()
    }
}

fn processing(target: Target, inputs: ProcessingInputs) -> Scenario {
    Scenario::new(DCID, DcClass::Rotation, Event::Processing, "i03")
        .with_visit("mx23694-127")
        .with_detector_class(DetectorClass::Eiger)
        .with_sweeps([Sweep::new(DCID, 1, 3600)])
        .with_target(target)
        .with_processing(inputs)
}

fn dispatch_with(
    scenario: &Scenario,
    context: &DispatchContext,
) -> Result<Vec<Invocation>, CoreError> {
    default_registry().unwrap().handle_scenario(scenario, context)
}

fn dispatch(scenario: &Scenario) -> Vec<Invocation> {
    dispatch_with(scenario, &DispatchContext::new()).unwrap()
}

fn only_job(invocations: &[Invocation]) -> &IspybJobInvocation {
    assert_eq!(invocations.len(), 1, "{invocations:?}");
    match &invocations[0] {
        Invocation::IspybJob(job) => job,
        other => panic!("expected an ISPyB job, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// DIMPLE
// ---------------------------------------------------------------------------

/// Every linked model is passed, files and PDB codes alike.
#[test]
fn dimple_with_models() {
    let inputs = ProcessingInputs {
        pdb: vec![PdbModel::from_file("/dls/models/lysozyme.pdb"), PdbModel::from_code("4abc")],
        ..results()
    };
    let invocations = dispatch(&processing(Target::Dimple, inputs));
    assert_eq!(
        command_lines(&invocations),
        vec![format!(
            "ispyb.job --new --dcid={DCID} --source=automatic --recipe=postprocessing-dimple \
             --add-param=data:/dls/i03/data/processed/scaled.mtz \
             --add-param=scaling_id:123456 --add-param=create_symlink:xia2 dials \
             --add-param=pdb:/dls/models/lysozyme.pdb --add-param=pdb:4abc \
             --display='DIMPLE' --trigger --trigger-variable=ispyb_autoprocscalingid:123456"
        )]
    );
}

#[test]
fn dimple_without_models_does_nothing() {
    assert!(dispatch(&processing(Target::Dimple, results())).is_empty());
}

#[test]
fn dimple_without_scaling_id_is_a_precondition_failure() {
    let inputs = ProcessingInputs {
        scaling_id: None,
        pdb: vec![PdbModel::from_code("4abc")],
        ..results()
    };
    assert_matches!(
        dispatch_with(&processing(Target::Dimple, inputs), &DispatchContext::new()),
        Err(CoreError::Precondition { dcid: DCID, .. })
    );
}

/// Screening data and non-MX beamlines are never solved.
#[test]
fn dimple_needs_mx_rotation() {
    let inputs = ProcessingInputs {
        pdb: vec![PdbModel::from_code("4abc")],
        ..results()
    };
    let screening = processing(Target::Dimple, inputs.clone()).with_dcclass(DcClass::Screening);
    assert!(dispatch(&screening).is_empty());

    let mut elsewhere = processing(Target::Dimple, inputs);
    elsewhere.beamline = "i19-1".to_string();
    assert!(dispatch(&elsewhere).is_empty());
}

// ---------------------------------------------------------------------------
// SHELXT
// ---------------------------------------------------------------------------

#[test]
fn shelxt_on_i19_only() {
    let mut scenario = processing(Target::Shelxt, results());
    assert!(dispatch(&scenario).is_empty());

    scenario.beamline = "i19-2".to_string();
    assert_eq!(
        command_lines(&dispatch(&scenario)),
        vec![format!(
            "ispyb.job --new --dcid={DCID} --source=automatic --recipe=postprocessing-shelxt \
             --add-param=scaling_id:123456 --display='shelxt' \
             --trigger-variable=ispyb_autoprocscalingid:123456"
        )]
    );
}

// ---------------------------------------------------------------------------
// MrBUMP
// ---------------------------------------------------------------------------

/// PDB codes alone give a single unconstrained search.
#[test]
fn mrbump_with_codes_only() {
    let inputs = ProcessingInputs {
        pdb: vec![PdbModel::from_code("4abc")],
        ..results()
    };
    let invocations = dispatch(&processing(Target::Mrbump, inputs));
    let job = only_job(&invocations);
    assert_eq!(job.recipe, "postprocessing-mrbump");
    assert!(!job.autostart);
    let keys: Vec<&str> = job.parameters.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, vec!["hklin", "scaling_id"]);
}

/// Local model files add a second search using them.
#[test]
fn mrbump_with_local_files() {
    let inputs = ProcessingInputs {
        pdb: vec![
            PdbModel::from_file("/dls/models/a.pdb"),
            PdbModel::from_code("4abc"),
            PdbModel::from_file("/dls/models/b.pdb"),
        ],
        ..results()
    };
    let invocations = dispatch(&processing(Target::Mrbump, inputs));
    assert_eq!(
        command_lines(&invocations),
        vec![
            format!(
                "ispyb.job --new --dcid={DCID} --source=automatic --recipe=postprocessing-mrbump \
                 --add-param=hklin:/dls/i03/data/processed/scaled.mtz \
                 --add-param=scaling_id:123456 --display='MrBUMP' \
                 --trigger-variable=ispyb_autoprocscalingid:123456"
            ),
            format!(
                "ispyb.job --new --dcid={DCID} --source=automatic --recipe=postprocessing-mrbump \
                 --add-param=hklin:/dls/i03/data/processed/scaled.mtz \
                 --add-param=scaling_id:123456 --add-param=dophmmer:False \
                 --add-param=mdlunmod:True --add-param=localfile:/dls/models/a.pdb \
                 --add-param=localfile:/dls/models/b.pdb --display='MrBUMP' \
                 --trigger-variable=ispyb_autoprocscalingid:123456"
            ),
        ]
    );
}

#[test]
fn mrbump_without_models_does_nothing() {
    assert!(dispatch(&processing(Target::Mrbump, results())).is_empty());
}

// ---------------------------------------------------------------------------
// fast_ep
// ---------------------------------------------------------------------------

#[test]
fn fast_ep_needs_an_anomalous_scatterer() {
    let scenario = processing(Target::FastEp, results());
    assert!(dispatch(&scenario).is_empty());

    let anomalous = scenario.with_anomalous_scatterer(AnomalousScatterer::new("Se"));
    assert_eq!(
        command_line(&dispatch(&anomalous)[0]),
        format!(
            "ispyb.job --new --dcid={DCID} --source=automatic --recipe=postprocessing-fast-ep \
             --add-param=data:/dls/i03/data/processed/scaled.mtz \
             --add-param=scaling_id:123456 --display='fast_ep' \
             --trigger-variable=ispyb_autoprocscalingid:123456"
        )
    );
}

// ---------------------------------------------------------------------------
// big_ep
// ---------------------------------------------------------------------------

fn big_ep(inputs: ProcessingInputs) -> Scenario {
    processing(Target::BigEp, inputs).with_anomalous_scatterer(AnomalousScatterer::new("S"))
}

#[test]
fn big_ep_with_known_upstream() {
    let scenario = big_ep(ProcessingInputs {
        upstream_source: Some("xia2-dials".to_string()),
        ..results()
    })
    .with_spacegroup(SpaceGroup::new("P 21 21 21"));
    let invocations = dispatch(&scenario);
    let job = only_job(&invocations);

    assert_eq!(job.recipe, "postprocessing-big-ep");
    let keys: Vec<&str> = job.parameters.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["data", "scaled_unmerged_mtz", "program_id", "scaling_id", "upstream_source"]
    );
    let variables: Vec<(&str, &str)> = job
        .triggervariables
        .iter()
        .map(|tv| (tv.key.as_str(), tv.value.as_str()))
        .collect();
    assert_eq!(
        variables,
        vec![
            ("ispyb_autoprocscalingid", "123456"),
            ("path_ext", "xia2/dials-run-P212121"),
        ]
    );
}

/// Unmapped upstream tags and missing provenance are left out, not invented.
#[test]
fn big_ep_omits_unknown_optionals() {
    let scenario = big_ep(ProcessingInputs {
        tag: Some("fast_dp".to_string()),
        ..results()
    });
    let invocations = dispatch(&scenario);
    let job = only_job(&invocations);
    assert!(job.parameters.iter().all(|p| p.key != "upstream_source"));
    assert_eq!(job.triggervariables.len(), 1);
}

#[test]
fn big_ep_needs_merged_and_unmerged_data() {
    let scenario = big_ep(ProcessingInputs {
        scaled_unmerged_mtz: None,
        ..results()
    });
    assert!(dispatch(&scenario).is_empty());
}

#[test]
fn big_ep_needs_program_id() {
    let scenario = big_ep(ProcessingInputs {
        program_id: None,
        ..results()
    });
    assert_matches!(
        dispatch_with(&scenario, &DispatchContext::new()),
        Err(CoreError::Precondition { dcid: DCID, .. })
    );
}

/// Without an anomalous scatterer there is no signal to phase from.
#[test]
fn big_ep_needs_an_anomalous_scatterer() {
    let scenario = processing(Target::BigEp, results());
    assert!(dispatch(&scenario).is_empty());
}

#[test]
fn big_ep_skips_industrial_visits() {
    let scenario = big_ep(results()).with_visit("in31337-2");
    assert!(dispatch(&scenario).is_empty());
}

// ---------------------------------------------------------------------------
// Cloudbursting
// ---------------------------------------------------------------------------

fn cloud_context() -> DispatchContext {
    DispatchContext::new().with_cloudburst_rule(CloudburstRule::new(
        Specification::beamline("i03"),
        ["big-ep", "mrbump"],
    ))
}

/// Matching recipes get the cloud variant and the cluster trigger variable.
#[test]
fn cloud_rule_reroutes_matching_recipes() {
    let invocations = dispatch_with(&big_ep(results()), &cloud_context()).unwrap();
    let job = only_job(&invocations);
    assert_eq!(job.recipe, "postprocessing-big-ep-cloud");
    assert_eq!(
        job.triggervariables.last().map(|tv| (tv.key.as_str(), tv.value.as_str())),
        Some(("statistic-cluster", "iris"))
    );

    let mrbump = processing(
        Target::Mrbump,
        ProcessingInputs {
            pdb: vec![PdbModel::from_code("4abc")],
            ..results()
        },
    );
    let invocations = dispatch_with(&mrbump, &cloud_context()).unwrap();
    assert_eq!(only_job(&invocations).recipe, "postprocessing-mrbump-cloud");
}

#[test]
fn cloud_rule_leaves_other_recipes_and_beamlines() {
    let fast_ep = processing(Target::FastEp, results())
        .with_anomalous_scatterer(AnomalousScatterer::new("Se"));
    let invocations = dispatch_with(&fast_ep, &cloud_context()).unwrap();
    assert_eq!(only_job(&invocations).recipe, "postprocessing-fast-ep");

    let mut elsewhere = big_ep(results());
    elsewhere.beamline = "i04".to_string();
    let invocations = dispatch_with(&elsewhere, &cloud_context()).unwrap();
    assert_eq!(only_job(&invocations).recipe, "postprocessing-big-ep");
}
