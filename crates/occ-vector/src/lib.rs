pub mod db;
pub mod error;
pub mod gateway;
pub mod types;

pub use error::{Result, VectorError};
pub use gateway::VectorGateway;
pub use types::{CollectionKind, CollectionSchema, CollectionStats, VectorFilter, VectorHit, VectorRow};

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use serde_json::json;

    use super::*;

    fn gateway() -> VectorGateway {
        VectorGateway::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn insert_and_search_ranks_by_cosine() {
        let gw = gateway();
        gw.ensure_collection("code", CollectionSchema { dimension: 3 }).unwrap();
        gw.insert(
            "code",
            &[
                VectorRow {
                    id: "a".into(),
                    embedding: vec![1.0, 0.0, 0.0],
                    metadata: json!({"lang": "rust"}),
                    owner_user_id: None,
                },
                VectorRow {
                    id: "b".into(),
                    embedding: vec![0.0, 1.0, 0.0],
                    metadata: json!({"lang": "python"}),
                    owner_user_id: None,
                },
            ],
        )
        .unwrap();

        let hits = gw
            .search("code", &[1.0, 0.0, 0.0], 5, &VectorFilter::default())
            .unwrap();
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let gw = gateway();
        gw.ensure_collection("code", CollectionSchema { dimension: 3 }).unwrap();
        let err = gw
            .insert(
                "code",
                &[VectorRow {
                    id: "a".into(),
                    embedding: vec![1.0, 0.0],
                    metadata: json!({}),
                    owner_user_id: None,
                }],
            )
            .unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));
    }

    #[test]
    fn nan_embedding_is_rejected() {
        let gw = gateway();
        gw.ensure_collection("code", CollectionSchema { dimension: 2 }).unwrap();
        let err = gw
            .insert(
                "code",
                &[VectorRow {
                    id: "a".into(),
                    embedding: vec![f32::NAN, 0.0],
                    metadata: json!({}),
                    owner_user_id: None,
                }],
            )
            .unwrap_err();
        assert!(matches!(err, VectorError::NonFiniteEmbedding));
    }

    #[test]
    fn search_against_missing_collection_fails() {
        let gw = gateway();
        let err = gw.search("ghost", &[1.0], 1, &VectorFilter::default()).unwrap_err();
        assert!(matches!(err, VectorError::CollectionMissing(_)));
    }

    #[test]
    fn duplicate_insert_overwrites() {
        let gw = gateway();
        gw.ensure_collection("code", CollectionSchema { dimension: 2 }).unwrap();
        gw.insert(
            "code",
            &[VectorRow { id: "a".into(), embedding: vec![1.0, 0.0], metadata: json!({"v": 1}), owner_user_id: None }],
        )
        .unwrap();
        gw.insert(
            "code",
            &[VectorRow { id: "a".into(), embedding: vec![0.0, 1.0], metadata: json!({"v": 2}), owner_user_id: None }],
        )
        .unwrap();
        let stats = gw.stats("code").unwrap();
        assert_eq!(stats.row_count, 1);
    }

    #[test]
    fn delete_filters_by_owner() {
        let gw = gateway();
        gw.ensure_collection("user-memory", CollectionSchema { dimension: 2 }).unwrap();
        gw.insert(
            "user-memory",
            &[
                VectorRow { id: "a".into(), embedding: vec![1.0, 0.0], metadata: json!({}), owner_user_id: Some("u1".into()) },
                VectorRow { id: "b".into(), embedding: vec![0.0, 1.0], metadata: json!({}), owner_user_id: Some("u2".into()) },
            ],
        )
        .unwrap();
        let deleted = gw
            .delete("user-memory", &VectorFilter { owner_user_id: Some("u1".into()), metadata_equals: vec![] })
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(gw.stats("user-memory").unwrap().row_count, 1);
    }
}
