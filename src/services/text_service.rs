use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::{models::TextEntity, row_store::TextRepository},
    dto::{
        command::{AddTextRequest, TextAddedResponse, TextResponse},
        race::TextRecord,
    },
    error::ServiceError,
    state::SharedState,
};

/// Draw a uniformly random passage from the collection.
///
/// The collection size is re-read on every draw, so passages added at runtime
/// immediately join the pool.
pub async fn random_text(state: &SharedState, id_only: bool) -> Result<TextResponse, ServiceError> {
    let text = draw_random(state).await?;
    Ok(if id_only {
        TextResponse::IdOnly { text_id: text.id }
    } else {
        TextResponse::Full {
            text: TextRecord::from(text),
        }
    })
}

/// Fetch one passage by id.
pub async fn text_by_id(state: &SharedState, text_id: &str) -> Result<TextResponse, ServiceError> {
    let store = state.require_row_store().await?;
    let text = store
        .find_text(text_id.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("text '{text_id}' does not exist")))?;

    Ok(TextResponse::Full {
        text: TextRecord::from(text),
    })
}

/// Contribute a new passage to the collection.
pub async fn add_text(
    state: &SharedState,
    request: AddTextRequest,
) -> Result<TextAddedResponse, ServiceError> {
    let store = state.require_row_store().await?;
    let text_id = Uuid::new_v4().simple().to_string();
    let text = TextEntity {
        id: text_id.clone(),
        content: request.content,
        origin: request.origin,
        author: request.author,
        uploader: request.uploader,
        kind: request.kind,
    };

    store.insert_text(text).await?;
    info!(text_id, "text added to the collection");
    Ok(TextAddedResponse { text_id })
}

/// Draw a random passage entity, used when assigning a text to a race.
pub(crate) async fn draw_random(state: &SharedState) -> Result<TextEntity, ServiceError> {
    let store = state.require_row_store().await?;
    let count = store.count_texts().await?;
    if count == 0 {
        return Err(ServiceError::EmptyCollection);
    }

    let offset = rand::rng().random_range(0..count);
    store
        .text_at_offset(offset)
        .await?
        // The collection shrank between the count and the fetch.
        .ok_or(ServiceError::EmptyCollection)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use super::*;
    use crate::{config::AppConfig, dao::row_store::memory::MemoryRowStore, state::AppState};

    async fn setup(texts: usize) -> SharedState {
        let state = AppState::new(AppConfig::default());
        let store = Arc::new(MemoryRowStore::new());
        for index in 0..texts {
            store
                .insert_text(TextEntity {
                    id: format!("text-{index}"),
                    content: format!("sample passage number {index} with enough words"),
                    origin: "test".into(),
                    author: "test".into(),
                    uploader: "test".into(),
                    kind: "type".into(),
                })
                .await
                .unwrap();
        }
        state.install_row_store(store).await;
        state
    }

    #[tokio::test]
    async fn random_draws_cover_the_whole_collection() {
        let state = setup(3).await;
        let mut hits: HashMap<String, u32> = HashMap::new();

        for _ in 0..600 {
            match random_text(&state, true).await.unwrap() {
                TextResponse::IdOnly { text_id } => *hits.entry(text_id).or_default() += 1,
                TextResponse::Full { .. } => panic!("expected id-only response"),
            }
        }

        assert_eq!(hits.len(), 3);
        // Expectation is 200 each; this band is far outside any plausible
        // deviation for a uniform draw.
        for count in hits.values() {
            assert!((140..=260).contains(count), "skewed draw: {hits:?}");
        }
    }

    #[tokio::test]
    async fn empty_collection_is_reported_as_such() {
        let state = setup(0).await;
        assert!(matches!(
            random_text(&state, false).await.unwrap_err(),
            ServiceError::EmptyCollection
        ));
    }

    #[tokio::test]
    async fn added_texts_join_the_draw_pool_and_are_fetchable() {
        let state = setup(0).await;
        let added = add_text(
            &state,
            AddTextRequest {
                content: "a freshly contributed passage to type".into(),
                origin: "somewhere".into(),
                author: "someone".into(),
                uploader: "p1".into(),
                kind: "quote".into(),
            },
        )
        .await
        .unwrap();

        match random_text(&state, false).await.unwrap() {
            TextResponse::Full { text } => assert_eq!(text.id, added.text_id),
            TextResponse::IdOnly { .. } => panic!("expected full record"),
        }
        assert!(text_by_id(&state, &added.text_id).await.is_ok());
        assert!(matches!(
            text_by_id(&state, "missing").await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
