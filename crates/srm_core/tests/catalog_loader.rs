use async_trait::async_trait;
use srm_core::{
    CatalogLoadError, CatalogLoader, CatalogSource, CatalogStatus, FileCatalogSource, Revision,
    SourceError, TIPS_DOCUMENT,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn catalog_json(family_title: &str, objective_ids: &[&str]) -> Vec<u8> {
    let objectives: Vec<_> = objective_ids
        .iter()
        .map(|id| serde_json::json!({ "id": id, "prose": "Verify {{ insert: param, x }} accounts.", "label": id }))
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "families": [{
            "id": "03.01",
            "title": family_title,
            "label": "AC",
            "controls": [{
                "id": "03.01.01",
                "title": "Account Management",
                "label": "AC.L2-3.1.1",
                "statement": "Manage accounts.",
                "objectives": objectives
            }]
        }]
    }))
    .unwrap()
}

/// In-memory source that answers each document after a fixed delay.
#[derive(Default)]
struct DelayedSource {
    documents: HashMap<String, (Duration, Vec<u8>)>,
}

impl DelayedSource {
    fn with(mut self, document: &str, delay_ms: u64, body: Vec<u8>) -> Self {
        self.documents.insert(
            document.to_string(),
            (Duration::from_millis(delay_ms), body),
        );
        self
    }
}

#[async_trait]
impl CatalogSource for DelayedSource {
    async fn fetch(&self, document: &str) -> Result<Vec<u8>, SourceError> {
        let Some((delay, body)) = self.documents.get(document) else {
            return Err(SourceError::Io {
                document: document.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            });
        };
        tokio::time::sleep(*delay).await;
        Ok(body.clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[tokio::test]
async fn later_request_wins_even_when_earlier_response_is_slower() {
    let source = DelayedSource::default()
        .with("controls.json", 200, catalog_json("Rev3 Access", &["o3"]))
        .with("controls-v2.json", 10, catalog_json("Rev2 Access", &["o2"]));
    let loader = CatalogLoader::new(source);

    let (rev3, rev2) = tokio::join!(loader.load(Revision::Rev3), loader.load(Revision::Rev2));

    let err = rev3.unwrap_err();
    assert!(matches!(err, CatalogLoadError::Superseded { revision: Revision::Rev3 }));
    assert_eq!(rev2.unwrap().revision, Revision::Rev2);

    let current = loader.current().unwrap();
    assert_eq!(current.revision, Revision::Rev2);
    assert_eq!(current.catalog.families[0].title, "Rev2 Access");
    assert_eq!(loader.status(), CatalogStatus::Ready(Revision::Rev2));
}

#[tokio::test]
async fn later_request_wins_when_earlier_response_is_faster() {
    let source = DelayedSource::default()
        .with("controls.json", 10, catalog_json("Rev3 Access", &["o3"]))
        .with("controls-v2.json", 80, catalog_json("Rev2 Access", &["o2"]));
    let loader = Arc::new(CatalogLoader::new(source));

    let first = {
        let loader = Arc::clone(&loader);
        tokio::spawn(async move { loader.load(Revision::Rev2).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = loader.load(Revision::Rev3).await.unwrap();

    assert!(first.await.unwrap().is_err());
    assert_eq!(second.revision, Revision::Rev3);
    assert_eq!(loader.current().unwrap().revision, Revision::Rev3);
    assert!(loader.current_for(Revision::Rev2).is_none());
}

#[tokio::test]
async fn failed_load_keeps_previous_catalog_and_is_retryable() {
    let source = DelayedSource::default()
        .with("controls.json", 0, catalog_json("Rev3 Access", &["o1"]))
        .with("controls-v2.json", 0, b"{ \"families\": [ { \"id\": 1 } ] }".to_vec());
    let loader = CatalogLoader::new(source);

    loader.load(Revision::Rev3).await.unwrap();
    let err = loader.load(Revision::Rev2).await.unwrap_err();
    assert!(matches!(err, CatalogLoadError::Malformed { revision: Revision::Rev2, .. }));
    assert!(err.is_load_failed());

    match loader.status() {
        CatalogStatus::LoadFailed { revision, reason } => {
            assert_eq!(revision, Revision::Rev2);
            assert!(reason.contains("malformed"));
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(loader.current().unwrap().revision, Revision::Rev3);
    assert!(loader.current_for(Revision::Rev2).is_none());

    loader.load(Revision::Rev3).await.unwrap();
    assert_eq!(loader.status(), CatalogStatus::Ready(Revision::Rev3));
}

#[tokio::test]
async fn missing_document_is_a_fetch_failure() {
    let loader = CatalogLoader::new(DelayedSource::default());
    let err = loader.load(Revision::Rev3).await.unwrap_err();
    assert!(matches!(err, CatalogLoadError::Fetch { revision: Revision::Rev3, .. }));
    assert!(loader.current().is_none());
}

#[tokio::test]
async fn duplicate_objective_ids_are_rejected() {
    let source = DelayedSource::default().with("controls.json", 0, catalog_json("AC", &["o1", "o1"]));
    let loader = CatalogLoader::new(source);
    let err = loader.load(Revision::Rev3).await.unwrap_err();
    assert!(err.to_string().contains("duplicate objective id"));
}

#[tokio::test]
async fn tips_are_optional() {
    let loader = CatalogLoader::new(DelayedSource::default());
    assert!(loader.load_tips().await.is_empty());

    let tips = serde_json::json!({
        "CMMC_Level_2_Practices": [{
            "practices": [
                {
                    "id": "AC.L2-3.1.1",
                    "evidence_artifacts": ["Account list"],
                    "implementation_tips": "Review quarterly."
                },
                { "id": "AC.L2-3.1.2", "evidence_artifacts": [], "implementation_tips": "" }
            ]
        }]
    });
    let source =
        DelayedSource::default().with(TIPS_DOCUMENT, 0, serde_json::to_vec(&tips).unwrap());
    let index = CatalogLoader::new(source).load_tips().await;

    let found = index.tips_for("AC.L2-3.1.1").unwrap();
    assert_eq!(found.evidence_artifacts, vec!["Account list".to_string()]);
    assert!(index.tips_for("AC.L2-3.1.2").is_none());
    assert!(index.tips_for("AC.L2-3.1.3").is_none());
}

#[tokio::test]
async fn directory_source_serves_revision_documents() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("controls-v2.json"),
        catalog_json("Access Control", &["3.1.1[a]"]),
    )
    .unwrap();
    let loader = CatalogLoader::new(FileCatalogSource::new(dir.path()));

    let loaded = loader.load(Revision::Rev2).await.unwrap();
    let objective = &loaded.catalog.families[0].controls[0].objectives[0];
    assert_eq!(objective.rendered_prose(), "Verify ___ accounts.");
    assert!(loader.load(Revision::Rev3).await.is_err());
}
