//! Integration tests for the ddpls binary.
//!
//! These tests spawn the server and talk JSON-RPC to it over stdio.

mod common;

use common::LspClient;
use serde_json::{Value, json};

const MAIN: &str = "file:///test/main.ddp";

fn diagnostics_for<'a>(uri: &'a str) -> impl Fn(&Value) -> bool + 'a {
    move |params| params["uri"] == uri
}

#[test]
fn test_initialize_response() {
    let mut client = LspClient::spawn();
    let response = client.initialize();

    assert!(
        response.get("result").is_some(),
        "Expected result in response"
    );

    let result = &response["result"];
    assert_eq!(result["serverInfo"]["name"], "ddpls");
    assert!(result["serverInfo"]["version"].is_string());

    let capabilities = &result["capabilities"];
    assert_eq!(capabilities["textDocumentSync"], json!(2));
    assert_eq!(capabilities["hoverProvider"], json!(true));
    assert_eq!(capabilities["definitionProvider"], json!(true));
    assert_eq!(capabilities["documentHighlightProvider"], json!(true));
    assert_eq!(capabilities["foldingRangeProvider"], json!(true));
    assert_eq!(capabilities["renameProvider"]["prepareProvider"], json!(true));
    assert!(capabilities["completionProvider"].is_object());

    let semantic = &capabilities["semanticTokensProvider"];
    assert_eq!(semantic["range"], json!(true));
    assert!(
        semantic["legend"]["tokenTypes"]
            .as_array()
            .is_some_and(|types| types.contains(&json!("function")))
    );
}

#[test]
fn test_shutdown_response() {
    let mut client = LspClient::spawn();
    client.initialize();

    let response = client.shutdown();

    assert_eq!(response["result"], json!(null));
    assert_eq!(response["id"], json!(999));
}

#[test]
fn test_diagnostics_follow_edits() {
    let mut client = LspClient::spawn();
    client.initialize();

    client.did_open(MAIN, "var x = ;\n");
    let published = client
        .wait_for_notification("textDocument/publishDiagnostics", diagnostics_for(MAIN))
        .expect("diagnostics should be published on open");
    let diagnostics = published["diagnostics"].as_array().unwrap();
    assert!(!diagnostics.is_empty());
    assert_eq!(diagnostics[0]["range"]["start"]["line"], json!(0));

    client.did_change(MAIN, 2, "var x = 1;\n");
    let cleared = client.wait_for_notification("textDocument/publishDiagnostics", |params| {
        params["uri"] == MAIN && params["diagnostics"] == json!([])
    });
    assert!(cleared.is_some(), "fixed document should publish no diagnostics");
}

#[test]
fn test_requests_on_open_document() {
    let mut client = LspClient::spawn();
    client.initialize();

    let source = "var answer = 42;\nvar twice = answer * 2;\n";
    client.did_open(MAIN, source);

    let hover = client.position_request(10, "textDocument/hover", MAIN, 1, 13);
    let contents = hover["result"]["contents"]["value"].as_str().unwrap();
    assert!(contents.contains("var answer: int"), "{contents}");

    let definition = client.position_request(11, "textDocument/definition", MAIN, 1, 13);
    assert_eq!(definition["result"]["uri"], MAIN);
    assert_eq!(definition["result"]["range"]["start"], json!({"line": 0, "character": 4}));

    let completion = client.position_request(12, "textDocument/completion", MAIN, 2, 0);
    let labels: Vec<_> = completion["result"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["label"].as_str())
        .collect();
    assert!(labels.contains(&"answer"));
    assert!(labels.contains(&"var"));

    let tokens = client.request(
        13,
        "textDocument/semanticTokens/full",
        json!({ "textDocument": { "uri": MAIN } }),
    );
    let data = tokens["result"]["data"].as_array().unwrap();
    assert!(!data.is_empty());
    assert_eq!(data.len() % 5, 0);

    let tree = client.request(14, "ddp/ast", json!({ "path": MAIN }));
    let items = tree["result"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["label"], "VarDecl");
    assert_eq!(items[0]["description"], "answer");
}

#[test]
fn test_request_for_unknown_document_is_invalid_params() {
    let mut client = LspClient::spawn();
    client.initialize();

    let response = client.position_request(20, "textDocument/hover", MAIN, 0, 0);
    assert_eq!(response["error"]["code"], json!(-32602));
}

#[test]
fn test_close_clears_diagnostics() {
    let mut client = LspClient::spawn();
    client.initialize();

    client.did_open(MAIN, "var x = ;\n");
    client
        .wait_for_notification("textDocument/publishDiagnostics", diagnostics_for(MAIN))
        .expect("diagnostics should be published on open");

    client.did_close(MAIN);
    let cleared = client.wait_for_notification("textDocument/publishDiagnostics", |params| {
        params["uri"] == MAIN && params["diagnostics"] == json!([])
    });
    assert!(cleared.is_some());

    let response = client.position_request(30, "textDocument/hover", MAIN, 0, 4);
    assert!(response.get("error").is_some());
}

