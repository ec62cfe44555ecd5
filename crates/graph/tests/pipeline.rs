use provreq_graph::{
    adjust_bundle, check_unreachable, nop_techniques, preprocess, read_bundle, read_catalog,
    remove_nops, simulate, DataFiles, GraphError,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const PROMISES: &str = "\
# general promise vocabulary
access_network, Network access
code_executed, Code executed on target
defense_evasion, Evading defenses
file_transfer, Can transfer files
info_network_hosts, Knows network hosts
objective_exfiltration, Data exfiltrated # terminal goal
persistence, Persistent foothold
";

const CONDITIONS: &str = "\
poor_security_practices, Weak security posture
moved_laterally
";

const TECHNIQUES: &str = r#"{
    "T1566": {
        "name": "Phishing",
        "requires": [],
        "provides": ["code_executed"],
        "conditional_provides": {},
        "children": {
            "T1566.001": {"name": "Spearphishing Attachment"}
        },
        "agent_class": ["Initial Access"]
    },
    "T1105": {
        "name": "Ingress Tool Transfer",
        "requires": ["code_executed"],
        "provides": ["file_transfer"],
        "conditional_provides": {"poor_security_practices": ["persistence"]},
        "agent_class": ["Command and Control"]
    },
    "T1046": {
        "name": "Network Service Discovery",
        "requires": ["file_transfer"],
        "provides": ["info_network_hosts"],
        "conditional_provides": {},
        "agent_class": ["Discovery"]
    },
    "T1048": {
        "name": "Exfiltration Over Alternative Protocol",
        "requires": ["info_network_hosts", "persistence"],
        "provides": ["objective_exfiltration"],
        "conditional_provides": {},
        "agent_class": ["Exfiltration"]
    },
    "T1036": {
        "name": "Masquerading",
        "requires": [],
        "provides": ["defense_evasion"],
        "conditional_provides": {},
        "agent_class": ["Defense Evasion"]
    },
    "T1021": {
        "name": "Remote Services",
        "requires": ["access_network"],
        "provides": ["code_executed"],
        "conditional_provides": {},
        "agent_class": ["Lateral Movement"]
    }
}"#;

const BUNDLE: &str = r#"{
    "agents": ["T1566.001", "T1105", "T1046", "T1048", "T1036", "T9999"],
    "extended_agents": ["T1021"]
}"#;

fn write_data(dir: &Path) -> DataFiles {
    fs::write(dir.join("promise_descriptions.csv"), PROMISES).unwrap();
    fs::write(dir.join("conditions.csv"), CONDITIONS).unwrap();
    fs::write(dir.join("agent_promises.json"), TECHNIQUES).unwrap();
    fs::write(dir.join("bundle.json"), BUNDLE).unwrap();
    DataFiles {
        agent_promises: dir.join("agent_promises.json"),
        promise_descriptions: dir.join("promise_descriptions.csv"),
        conditions: dir.join("conditions.csv"),
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn full_pipeline_reaches_objective_with_system_condition() {
    let temp = tempdir().unwrap();
    let files = write_data(temp.path());

    let build = read_catalog(&files).expect("catalog");
    assert!(build.is_valid());
    let (catalog, expansion_map) = build.into_trusted().unwrap();
    assert!(catalog.contains("T1566.001"));
    assert!(catalog.contains("T1105_poor_security_practices"));

    let bundle = read_bundle(&temp.path().join("bundle.json"), false).unwrap();
    let bundle = preprocess(&catalog, &expansion_map, &bundle);
    assert!(!bundle.contains(&"T9999".to_string()));
    assert!(bundle.contains(&"T1105_poor_security_practices".to_string()));

    let nops = nop_techniques(&catalog, &["defense_evasion".to_string()], false);
    let (bundle, removed) = remove_nops(&bundle, &nops);
    assert_eq!(removed, vec!["T1036".to_string()]);

    let sim = simulate(&[], &bundle, &catalog, &["poor_security_practices".to_string()]).unwrap();
    assert_eq!(sim.stages[0].techniques, set(&["T1566.001"]));
    assert_eq!(
        sim.stages[1].techniques,
        set(&["T1105", "T1105_poor_security_practices"])
    );
    assert_eq!(sim.stages[2].techniques, set(&["T1046"]));
    assert_eq!(sim.stages[3].techniques, set(&["T1048"]));
    assert_eq!(sim.objectives, set(&["objective_exfiltration"]));
    assert!(sim.backburner.is_empty());
}

#[test]
fn without_system_condition_objective_is_out_of_reach() {
    let temp = tempdir().unwrap();
    let files = write_data(temp.path());
    let (catalog, expansion_map) = read_catalog(&files).unwrap().into_trusted().unwrap();

    let bundle = read_bundle(&temp.path().join("bundle.json"), true).unwrap();
    let bundle = preprocess(&catalog, &expansion_map, &bundle);
    let adjusted = adjust_bundle(&bundle, &[], &["T1036".to_string(), "T0000".to_string()]);
    assert_eq!(adjusted.not_present, vec!["T0000".to_string()]);

    let sim = simulate(&[], &adjusted.bundle, &catalog, &[]).unwrap();
    assert!(!sim.reached("objective_exfiltration"));
    assert_eq!(
        sim.backburner.iter().cloned().collect::<BTreeSet<_>>(),
        set(&["T1021", "T1048", "T1105_poor_security_practices"])
    );
}

#[test]
fn audit_flags_unseeded_requirements() {
    let temp = tempdir().unwrap();
    write_data(temp.path());
    let document =
        provreq_graph::catalog::read_document(&temp.path().join("agent_promises.json")).unwrap();
    let flat = provreq_graph::catalog::flatten_document(&document);

    let report = check_unreachable(&flat);
    assert_eq!(report.conditional_only, vec!["T1048".to_string()]);
    assert_eq!(report.unreachable, vec!["T1021".to_string()]);
}

#[test]
fn misspelled_promise_is_fatal_with_suggestions() {
    let temp = tempdir().unwrap();
    let files = write_data(temp.path());
    fs::write(
        &files.agent_promises,
        r#"{"T1": {"name": "Typo", "requires": ["code_execute"], "provides": [], "conditional_provides": {}}}"#,
    )
    .unwrap();

    match read_catalog(&files).unwrap_err() {
        GraphError::UnknownPromises(suggestions) => {
            assert_eq!(suggestions[0].promise, "code_execute");
            assert_eq!(suggestions[0].candidates[0], "code_executed");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_file_names_the_path() {
    let temp = tempdir().unwrap();
    let files = DataFiles {
        agent_promises: temp.path().join("nope.json"),
        promise_descriptions: temp.path().join("promise_descriptions.csv"),
        conditions: temp.path().join("conditions.csv"),
    };
    let err = read_catalog(&files).unwrap_err();
    assert!(err.to_string().contains("nope.json"));
}
