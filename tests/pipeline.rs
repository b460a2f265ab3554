//! End-to-end card lifecycle over SQLite and on-disk blobs, with offline
//! fake providers.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use umesao::db;
use umesao::migrate;
use umesao::object_store_fs::FsObjectStore;
use umesao::sqlite_store::SqliteStore;
use umesao_core::embedding::{EmbeddingProvider, IndexedEmbedding};
use umesao_core::error::{Error, Result};
use umesao_core::extract::{ImageUpload, TextExtractor};
use umesao_core::lifecycle::{CardManager, EditOutcome};
use umesao_core::models::{CardId, ExtractionMethod};
use umesao_core::object_store::{Buckets, ObjectStore};
use umesao_core::search::{lookup, RankingPolicy, SearchParams};
use umesao_core::store::Store;

/// Letter-frequency vectors over a-z.
struct Letters;

#[async_trait]
impl EmbeddingProvider for Letters {
    fn model_name(&self) -> &str {
        "letters"
    }
    fn dims(&self) -> usize {
        26
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        // Reverse order to exercise index-based reassembly.
        Ok(texts
            .iter()
            .enumerate()
            .rev()
            .map(|(index, t)| {
                let mut v = vec![0.0f32; 26];
                for c in t.to_ascii_lowercase().bytes() {
                    if c.is_ascii_lowercase() {
                        v[(c - b'a') as usize] += 1.0;
                    }
                }
                IndexedEmbedding { index, vector: v }
            })
            .collect())
    }
}

/// `Letters` that can be switched off.
struct Switchable {
    down: AtomicBool,
}

#[async_trait]
impl EmbeddingProvider for Switchable {
    fn model_name(&self) -> &str {
        "letters"
    }
    fn dims(&self) -> usize {
        26
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<IndexedEmbedding>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::external("embedding", "down"));
        }
        Letters.embed(texts).await
    }
}

struct Fixed {
    method: ExtractionMethod,
    text: &'static str,
}

#[async_trait]
impl TextExtractor for Fixed {
    fn method(&self) -> ExtractionMethod {
        self.method
    }
    async fn extract(&self, _image: &ImageUpload) -> Result<String> {
        Ok(self.text.to_string())
    }
}

struct Broken;

#[async_trait]
impl TextExtractor for Broken {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ocr
    }
    async fn extract(&self, _image: &ImageUpload) -> Result<String> {
        Err(Error::RetryExhausted {
            operation: "Azure Read fetch".into(),
            attempts: 3,
            last_error: "operation status is 'running'".into(),
        })
    }
}

fn photo(name: &str) -> ImageUpload {
    ImageUpload {
        file_name: name.into(),
        bytes: vec![0xff, 0xd8, 0xff],
        content_type: "image/jpeg".into(),
    }
}

async fn setup() -> (TempDir, SqliteStore, FsObjectStore) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("ume.sqlite")).await.unwrap();
    migrate::migrate(&pool).await.unwrap();
    let objects = FsObjectStore::new(tmp.path().join("blobs"));
    (tmp, SqliteStore::new(pool), objects)
}

fn params(top_k: usize, policy: RankingPolicy) -> SearchParams {
    SearchParams { top_k, policy }
}

#[tokio::test]
async fn test_full_card_lifecycle() {
    let (tmp, store, objects) = setup().await;
    let mgr = CardManager::new(&store, &objects, Buckets::default());

    let zebra = mgr
        .upload(
            &photo("zebra.jpg"),
            &Fixed {
                method: ExtractionMethod::Ocr,
                text: "# Zebra\nZebras graze. Stripes dazzle!",
            },
            &Letters,
        )
        .await
        .unwrap();
    let apple = mgr
        .upload(
            &photo("apple.jpg"),
            &Fixed {
                method: ExtractionMethod::Ocr,
                text: "# Apple\nApples are sweet. Pie please.",
            },
            &Letters,
        )
        .await
        .unwrap();
    assert_eq!(zebra.version, 1);
    assert_eq!(zebra.chunks_total, 4);
    assert!(tmp
        .path()
        .join(format!("blobs/card-images/{}_zebra.jpg", zebra.card_id))
        .exists());
    assert!(tmp
        .path()
        .join(format!("blobs/card-markdown/{}_1.md", zebra.card_id))
        .exists());

    let hits = lookup(&store, &Letters, "zebras", &params(10, RankingPolicy::ChunkFirst))
        .await
        .unwrap();
    assert_eq!(hits[0].card_id, zebra.card_id);
    let cards: Vec<CardId> = hits.iter().map(|h| h.card_id).collect();
    assert_eq!(cards.len(), 2, "one result per card: {:?}", cards);

    // Rewrite the zebra card so it is about apples; only v2 is searchable.
    let outcome = mgr
        .edit(zebra.card_id, "# Orchard\nApples everywhere.", &Letters)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        EditOutcome::Created {
            version: 2,
            chunks_stored: 3
        }
    );
    let hits = lookup(&store, &Letters, "zebras", &params(10, RankingPolicy::CardBest))
        .await
        .unwrap();
    assert!(hits
        .iter()
        .filter(|h| h.card_id == zebra.card_id)
        .all(|h| h.version == 2));

    // Same bytes again: nothing written.
    let unchanged = mgr
        .edit(zebra.card_id, "# Orchard\nApples everywhere.", &Letters)
        .await
        .unwrap();
    assert_eq!(unchanged, EditOutcome::Unchanged { version: 2 });
    assert_eq!(store.versions(zebra.card_id).await.unwrap().len(), 2);

    // Old versions stay downloadable.
    let v1 = mgr.markdown(zebra.card_id, 1).await.unwrap();
    assert!(v1.content.starts_with("# Zebra"));
    assert!(mgr.markdown(zebra.card_id, 3).await.unwrap_err().is_not_found());

    let report = mgr.delete(zebra.card_id).await.unwrap();
    assert_eq!(report.blobs_deleted, 3);
    assert_eq!(report.blob_failures, 0);
    assert!(!store.card_exists(zebra.card_id).await.unwrap());
    assert!(objects
        .get("card-markdown", &format!("{}_2.md", zebra.card_id))
        .await
        .unwrap_err()
        .is_not_found());

    let hits = lookup(&store, &Letters, "apples", &params(10, RankingPolicy::ChunkFirst))
        .await
        .unwrap();
    assert!(hits.iter().all(|h| h.card_id == apple.card_id));

    mgr.delete(apple.card_id).await.unwrap();
    let err = lookup(&store, &Letters, "apples", &SearchParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyCorpus));
}

#[tokio::test]
async fn test_vision_card_edits_stay_flat() {
    let (_tmp, store, objects) = setup().await;
    let mgr = CardManager::new(&store, &objects, Buckets::default());

    let report = mgr
        .upload(
            &photo("chart.png"),
            &Fixed {
                method: ExtractionMethod::Vision,
                text: "A bar chart of sales. Sales rise in May.",
            },
            &Letters,
        )
        .await
        .unwrap();
    assert_eq!(report.chunks_total, 3);

    // Flat chunking ignores the heading marker: whole text + 2 sentences.
    let outcome = mgr
        .edit(report.card_id, "# A pie chart. Costs fall.", &Letters)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        EditOutcome::Created {
            version: 2,
            chunks_stored: 3
        }
    );
    let image = mgr.image(report.card_id).await.unwrap();
    assert_eq!(image.method, ExtractionMethod::Vision);
}

#[tokio::test]
async fn test_failed_extraction_leaves_nothing_behind() {
    let (tmp, store, objects) = setup().await;
    let mgr = CardManager::new(&store, &objects, Buckets::default());

    let err = mgr
        .upload(&photo("blurry.jpg"), &Broken, &Letters)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.cards, 0);
    assert_eq!(stats.images, 0);
    let images = tmp.path().join("blobs/card-images");
    let leftover = std::fs::read_dir(&images)
        .map(|d| d.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn test_stale_snapshot_edit_conflicts() {
    let (_tmp, store, objects) = setup().await;
    let mgr = CardManager::new(&store, &objects, Buckets::default());
    let card = mgr
        .upload(
            &photo("a.jpg"),
            &Fixed {
                method: ExtractionMethod::Mistral,
                text: "# A\nFirst.",
            },
            &Letters,
        )
        .await
        .unwrap()
        .card_id;

    let snapshot = mgr.latest_markdown(card).await.unwrap();
    mgr.apply_edit(card, &snapshot, "# A\nSecond.", &Letters)
        .await
        .unwrap();
    // An edit based on the same v1 download goes to v3, not v2.
    let outcome = mgr
        .apply_edit(card, &snapshot, "# A\nThird.", &Letters)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        EditOutcome::Created {
            version: 3,
            chunks_stored: 3
        }
    );

    // Writing an existing version directly is a constraint violation.
    let err = store.insert_version(card, 2, "deadbeef").await.unwrap_err();
    assert!(matches!(err, Error::StorageConstraint { .. }));
}

#[tokio::test]
async fn test_failed_edit_is_rolled_back() {
    let (tmp, store, objects) = setup().await;
    let mgr = CardManager::new(&store, &objects, Buckets::default());
    let embedder = Switchable {
        down: AtomicBool::new(false),
    };
    let card = mgr
        .upload(
            &photo("apple.jpg"),
            &Fixed {
                method: ExtractionMethod::Ocr,
                text: "Apples are red.",
            },
            &embedder,
        )
        .await
        .unwrap()
        .card_id;

    embedder.down.store(true, Ordering::SeqCst);
    let err = mgr.edit(card, "Bananas.", &embedder).await.unwrap_err();
    assert!(matches!(err, Error::ExternalService { .. }));

    let stats = store.stats().await.unwrap();
    assert_eq!((stats.versions, stats.chunks), (1, 2));
    assert!(!tmp
        .path()
        .join(format!("blobs/card-markdown/{}_2.md", card))
        .exists());
    let hits = lookup(&store, &Letters, "apples", &SearchParams::default())
        .await
        .unwrap();
    assert_eq!((hits[0].card_id, hits[0].version), (card, 1));

    embedder.down.store(false, Ordering::SeqCst);
    let outcome = mgr.edit(card, "Bananas.", &embedder).await.unwrap();
    assert_eq!(
        outcome,
        EditOutcome::Created {
            version: 2,
            chunks_stored: 2
        }
    );
}

#[tokio::test]
async fn test_blank_latest_version_is_empty_corpus() {
    let (_tmp, store, objects) = setup().await;
    let mgr = CardManager::new(&store, &objects, Buckets::default());
    let card = mgr
        .upload(
            &photo("a.jpg"),
            &Fixed {
                method: ExtractionMethod::Ocr,
                text: "Apples are red.",
            },
            &Letters,
        )
        .await
        .unwrap()
        .card_id;

    let outcome = mgr.edit(card, "  \n", &Letters).await.unwrap();
    assert_eq!(
        outcome,
        EditOutcome::Created {
            version: 2,
            chunks_stored: 0
        }
    );
    let err = lookup(&store, &Letters, "apples", &SearchParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyCorpus));
}
