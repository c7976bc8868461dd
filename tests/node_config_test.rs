//! Node manager configuration codec tests.
//!
//! The JSON and XML forms describe the same model; converting either way and
//! back must preserve every field.

use fg_core::Error;
use framegrid::nodes::{json, xml, GENERIC_LAUNCHER};

const SAMPLE_JSON: &str = r#"[
  {
    "target": "node-1.localdomain",
    "services": [
      {
        "name": "FaceDetection",
        "cmd": "/opt/framegrid/bin/face-detection",
        "args": ["--port", "7012"],
        "workingDirectory": "/opt/framegrid/face",
        "count": 2,
        "launcher": "generic",
        "description": "Face detection service",
        "envVars": [
          {"key": "LD_LIBRARY_PATH", "value": "/opt/framegrid/face/lib", "sep": ":"}
        ]
      },
      {
        "name": "Markup",
        "cmd": "/opt/framegrid/bin/markup"
      }
    ]
  },
  {
    "target": "node-2.localdomain"
  }
]"#;

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn json_to_xml_to_json_preserves_the_model() {
    let config = json::from_json(SAMPLE_JSON).unwrap();
    assert_eq!(config.managers.len(), 2);

    let rendered = xml::to_xml(&config).unwrap();
    let reparsed = xml::from_xml(&rendered).unwrap();
    assert_eq!(config, reparsed);

    let json_round = json::from_json(&json::to_json(&reparsed).unwrap()).unwrap();
    assert_eq!(config, json_round);
}

#[test]
fn sparse_service_fills_defaults_in_both_codecs() {
    let config = json::from_json(SAMPLE_JSON).unwrap();
    let markup = &config.managers[0].services[1];
    assert_eq!(markup.count, 1);
    assert_eq!(markup.launcher, GENERIC_LAUNCHER);
    assert!(markup.args.is_empty());
    assert!(markup.working_directory.is_none());

    // The XML form drops nothing on the way through.
    let round = xml::from_xml(&xml::to_xml(&config).unwrap()).unwrap();
    let markup = &round.managers[0].services[1];
    assert_eq!(markup.count, 1);
    assert_eq!(markup.launcher, GENERIC_LAUNCHER);
}

#[test]
fn rendered_xml_uses_the_node_manager_vocabulary() {
    let config = json::from_json(SAMPLE_JSON).unwrap();
    let rendered = xml::to_xml(&config).unwrap();

    assert!(rendered.contains("<nodeManagers>"));
    assert!(rendered.contains(r#"<nodeManager target="node-1.localdomain">"#));
    assert!(rendered.contains(r#"<service name="FaceDetection" launcher="generic" count="2">"#));
    assert!(rendered.contains("<cmd>/opt/framegrid/bin/face-detection</cmd>"));
    assert!(rendered.contains("<arg>--port</arg>"));
    assert!(rendered.contains(r#"<environmentVariable key="LD_LIBRARY_PATH" sep=":">"#));
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn malformed_json_is_an_invalid_configuration() {
    let err = json::from_json("{not json").unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)));
    assert!(err.to_string().contains("Invalid node manager JSON"));
}

#[test]
fn malformed_xml_is_an_invalid_configuration() {
    let err = xml::from_xml("<nodeManagers><cmd></arg></nodeManagers>").unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)));
    assert!(err.to_string().contains("Invalid node manager XML"));
}

#[test]
fn service_missing_its_command_is_rejected() {
    let xml_form = r#"<nodeManagers>
    <nodeManager target="node-1">
        <service name="NoCmd"/>
    </nodeManager>
</nodeManagers>"#;
    let err = xml::from_xml(xml_form).unwrap_err();
    assert!(err.to_string().contains("service NoCmd has no cmd element"));
}
