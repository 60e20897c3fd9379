//! Neighbourhood traversal over any [`FactStore`].
//!
//! Traversal is depth-bounded and tracks every entity it has expanded, so it
//! terminates on graphs with cycles of any length. An entity reachable along
//! several paths is expanded once, under the first path that reaches it.

use std::{
  collections::{BTreeMap, HashSet},
  future::Future,
  pin::Pin,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  key::EntityKey,
  store::{FactStore, TripleQuery},
  triple::Triple,
};

/// Hard cap on the traversal depth, whatever the caller asks for.
pub const MAX_CONNECTION_DEPTH: usize = 5;

/// Maximum triples fetched per direction per entity.
pub const CONNECTION_FANOUT: usize = 100;

/// Both edge directions of one entity, plus the neighbourhood of each
/// neighbour when more than one level was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConnections {
  pub entity:     String,
  pub outgoing:   Vec<Triple>,
  pub incoming:   Vec<Triple>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub next_level: BTreeMap<String, EntityConnections>,
}

/// Connections of `key` up to `depth` levels (clamped to
/// `1..=MAX_CONNECTION_DEPTH`).
pub async fn entity_connections<S: FactStore>(
  store: &S,
  key: &EntityKey,
  depth: usize,
) -> Result<EntityConnections, S::Error> {
  let depth = depth.clamp(1, MAX_CONNECTION_DEPTH);
  let origin = key.encode();
  debug!(entity = %origin, depth, "expanding connections");
  let mut visited = HashSet::from([origin.clone()]);
  expand(store, origin, depth, &mut visited).await
}

type ExpandFuture<'a, E> =
  Pin<Box<dyn Future<Output = Result<EntityConnections, E>> + Send + 'a>>;

fn expand<'a, S: FactStore>(
  store: &'a S,
  entity: String,
  depth: usize,
  visited: &'a mut HashSet<String>,
) -> ExpandFuture<'a, S::Error> {
  Box::pin(async move {
    let out_query = TripleQuery::subject(entity.clone()).with_limit(CONNECTION_FANOUT);
    let in_query = TripleQuery::object(entity.clone()).with_limit(CONNECTION_FANOUT);
    let outgoing = store.get_triples(&out_query).await?;
    let incoming = store.get_triples(&in_query).await?;

    let mut next_level = BTreeMap::new();
    if depth > 1 {
      let mut frontier = Vec::new();
      let neighbours = outgoing
        .iter()
        .map(|t| &t.object)
        .chain(incoming.iter().map(|t| &t.subject));
      for neighbour in neighbours {
        if visited.insert(neighbour.clone()) {
          frontier.push(neighbour.clone());
        }
      }

      for neighbour in frontier {
        let nested = expand(store, neighbour.clone(), depth - 1, visited).await?;
        next_level.insert(neighbour, nested);
      }
    }

    Ok(EntityConnections { entity, outgoing, incoming, next_level })
  })
}
