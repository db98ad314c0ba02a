// crates/flowconvert/tests/demo_fixture_test.rs

use flowconvert::{demo_workflow, from_legacy_str, import_str, DEMO_LEGACY_JSON, FALSE_LABEL, TRUE_LABEL};
use flowcore::{EdgeType, LifeCycle, NodeData, NodeKind, DataType};

const START_ID: &str = "CBB2F97AB84BD4BE0A8B8391398F645BD";
const CONDITION_ID: &str = "C397201582EA4454B8C5FFCD5001C9105";
const CONVERT_ID: &str = "C7029C8451993440EA4DC3302D97E9A3F";
const ERROR_HANDLER_ID: &str = "CDD331AAF87114BB69A18BA870A72F84E";
const ERROR_ID: &str = "CF144E567CE494F3F9437514BBB75CABF";

#[test]
fn test_demo_converts_every_node() {
    let workflow = demo_workflow().expect("bundled demo should convert");

    assert_eq!(workflow.name, "门诊登记");
    assert_eq!(workflow.id, "049FD372E4704F508D08AD2870D8B309");
    assert_eq!(workflow.start_id, START_ID);
    assert_eq!(workflow.error_id.as_deref(), Some(ERROR_ID));
    assert_eq!(workflow.nodes.len(), 9, "All nine process entries have known types");
    assert_eq!(workflow.variables.len(), 5);
    assert_eq!(workflow.expressions.len(), 4);

    assert_eq!(workflow.nodes_of_kind(NodeKind::Start).count(), 1);
    assert_eq!(workflow.nodes_of_kind(NodeKind::End).count(), 1);
    assert_eq!(workflow.nodes_of_kind(NodeKind::VarValue).count(), 2);
    assert_eq!(workflow.nodes_of_kind(NodeKind::Error).count(), 2);
}

#[test]
fn test_demo_synthesizes_edges() {
    let workflow = demo_workflow().unwrap();

    assert_eq!(workflow.edges.len(), 8);

    let plain_defaults = workflow
        .edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::Default && e.label.is_none())
        .count();
    assert_eq!(plain_defaults, 6, "One unlabeled edge per nextId link");

    let true_branch = workflow
        .find_edge(&format!("{}-true", CONDITION_ID))
        .expect("condition true branch");
    assert_eq!(true_branch.edge_type, EdgeType::Success);
    assert_eq!(true_branch.target, CONVERT_ID);
    assert_eq!(true_branch.label.as_deref(), Some(TRUE_LABEL));

    let false_branch = workflow
        .find_edge(&format!("{}-false", CONDITION_ID))
        .expect("condition false branch");
    assert_eq!(false_branch.edge_type, EdgeType::Default);
    assert_eq!(false_branch.target, ERROR_HANDLER_ID);
    assert_eq!(false_branch.label.as_deref(), Some(FALSE_LABEL));

    assert!(workflow.edges.iter().all(|e| e.edge_type != EdgeType::Error));
}

#[test]
fn test_demo_payloads() {
    let workflow = demo_workflow().unwrap();

    match &workflow.nodes[CONVERT_ID].data {
        NodeData::DataTypeConvert(convert) => {
            assert_eq!(convert.source_type, DataType::String);
            assert_eq!(convert.target_type, DataType::Json);
            assert_eq!(convert.source_variable_id, "4B65048041F947A59A3502788432BA1C");
        }
        other => panic!("Expected a type conversion, got {:?}", other),
    }

    match &workflow.nodes[CONDITION_ID].data {
        NodeData::Condition(condition) => {
            assert_eq!(condition.expression, "FC8DF2AB68F33D40C88A4D80F9AFCE4ED5");
        }
        other => panic!("Expected a condition, got {:?}", other),
    }

    let input = &workflow.variables["DDD4EB7310AF45D2A8AC5FA5DEBA44FB"];
    assert_eq!(input.name, "P_J_Input");
    assert_eq!(input.data_type, Some(DataType::Json));
    assert_eq!(input.life_cycle, LifeCycle::Single);

    let check = &workflow.expressions["FC8DF2AB68F33D40C88A4D80F9AFCE4ED5"];
    assert_eq!(
        check.variable_ids().collect::<Vec<_>>(),
        vec!["DDD4EB7310AF45D2A8AC5FA5DEBA44FB"]
    );
    assert_eq!(
        check.source_text(),
        "if (P_J_Input != null) return true; else return false;"
    );
}

#[test]
fn test_reimport_is_deterministic() {
    let first = from_legacy_str(DEMO_LEGACY_JSON).unwrap();
    let second = import_str(DEMO_LEGACY_JSON).unwrap();

    assert_eq!(first.edges, second.edges);
    for (id, node) in &first.nodes {
        assert_eq!(node.position, second.nodes[id].position, "Position of {} moved", id);
        let position = node.position.expect("Converted nodes are always placed");
        assert!((200.0..1000.0).contains(&position.x));
        assert!((100.0..700.0).contains(&position.y));
    }
}
