use std::time::Duration;

use pretty_assertions::assert_eq;
use rne_core_types::{ChangeRecord, ChangeSource, HostTree, ObserveScope, Selector};
use rne_dom::{Document, El};

const TIMELINE: &str = r#"
tag: div
id: timeline
children:
  - tag: ol
    classes: [stream-items, js-navigable-stream]
    children:
      - tag: li
        children:
          - tag: div
            classes: [tweet]
            attrs:
              data-user-id: "42"
            children:
              - tag: div
                classes: [content]
                text: first
"#;

#[test]
fn yaml_markup_instantiates_and_matches() {
    let el: El = serde_yaml::from_str(TIMELINE).unwrap();
    let doc = Document::new();
    let timeline = doc.append(doc.body(), &el).unwrap();

    let tweets = HostTree::select_all(
        &doc,
        doc.document_root(),
        &Selector::parse("div.tweet[data-user-id='42']").unwrap(),
    );
    assert_eq!(tweets.len(), 1);
    assert!(HostTree::contains(&doc, timeline, tweets[0]));
    assert_eq!(doc.text_content(tweets[0]), "first");
}

#[test]
fn json_markup_uses_the_same_shape() {
    let el: El = serde_json::from_str(
        r#"{"tag":"section","classes":["js-column"],"children":[{"tag":"article","classes":["stream-item"]}]}"#,
    )
    .unwrap();
    assert_eq!(
        el,
        El::new("section")
            .class("js-column")
            .child(El::new("article").class("stream-item"))
    );
}

#[test]
fn text_nodes_are_not_elements() {
    let doc = Document::new();
    let text = doc.create_text("hi");
    doc.append_child(doc.body(), text).unwrap();
    assert!(!HostTree::is_element(&doc, text));
    assert!(HostTree::is_element(&doc, doc.body()));
    assert!(doc.add_class(text, "x").is_err());
}

#[test]
fn replace_children_reports_one_record() {
    let doc = Document::new();
    let list = doc
        .append(doc.body(), &El::new("ol").child(El::new("li")))
        .unwrap();
    let old = doc.children(list);
    let observer = HostTree::observe(&doc, list, ObserveScope::Children);

    let new = doc
        .replace_children(list, &[El::new("li"), El::new("li")])
        .unwrap();

    let notices = doc.take_changes();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].observer, observer);
    assert_eq!(
        notices[0].batch.records,
        vec![ChangeRecord {
            added: new,
            removed: old
        }]
    );
    assert!(doc.take_changes().is_empty());
}

#[tokio::test]
async fn change_signal_wakes_on_mutation() {
    let doc = std::sync::Arc::new(Document::new());
    HostTree::observe(doc.as_ref(), doc.body(), ObserveScope::Subtree);
    let signal = doc.change_signal();

    let writer = std::sync::Arc::clone(&doc);
    tokio::spawn(async move {
        writer.append(writer.body(), &El::new("div")).unwrap();
    });

    tokio::time::timeout(Duration::from_secs(1), signal.notified())
        .await
        .expect("mutation should notify");
    assert_eq!(doc.take_changes().len(), 1);
}
