//! The recursive `ParaMatch` decision procedure (§4.5): combines `h_v`,
//! top-k paraphrase paths, and `h_p`-scored recursion into a same-vertex
//! judgement, with cycle-breaking, pruning by `max_score`, and
//! back-invalidation of stale positives.

use crate::backend::Backend;
use crate::error::MatchError;
use crate::graph::Uri;
use crate::session::Session;
use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;

/// `para_match(u, v)` (§4.5). Boxed because the recursion calls itself
/// through an `async fn` the compiler cannot size statically — the
/// standard workaround for recursive `async fn` without a crate.
pub fn para_match<'a, B: Backend>(
    backend: &'a mut B,
    session: &'a mut Session,
    u_uri: &'a Uri,
    v_uri: &'a Uri,
) -> Pin<Box<dyn Future<Output = Result<bool, MatchError>> + Send + 'a>>
where
    B::Repr: 'a,
{
    Box::pin(async move {
        let key = (u_uri.clone(), v_uri.clone());
        if let Some((matched, _)) = session.cache.get(&key) {
            return Ok(*matched);
        }

        // Step 1: h_v gate. No provisional entry exists yet, so nothing
        // could have witnessed this pair — plain caching, no invalidation.
        if !backend.h_v(session, u_uri, v_uri).await? {
            session.cache.insert(key, (false, Vec::new()));
            return Ok(false);
        }

        // Step 2: server leaf short-circuit (asymmetric — §9).
        if backend.is_server_leaf(u_uri) {
            session.cache.insert(key, (true, Vec::new()));
            return Ok(true);
        }

        // Step 3: provisional sentinel, breaks cycles in the recursion
        // graph; overwritten before this call returns.
        session.cache.insert(key.clone(), (true, Vec::new()));

        // Step 4: top-k paraphrase paths from both sides.
        let server_paths = backend.server_paths(session, u_uri).await;
        let client_paths = backend.client_paths(session, v_uri).await?;

        // Step 5: build L — per server-path bucket of client candidates,
        // scored by h_p and sorted descending; max_score sums each
        // bucket's best.
        let mut buckets: Vec<Vec<(usize, f64)>> = Vec::with_capacity(server_paths.len());
        let mut max_score = 0.0_f64;
        for sp in &server_paths {
            let mut bucket = Vec::new();
            for (j, cp) in client_paths.iter().enumerate() {
                if backend.h_v(session, &sp.next_vertex, &cp.next_vertex).await? {
                    let score = backend.h_p(session, &sp.repr, &cp.repr).await?;
                    bucket.push((j, score));
                }
            }
            bucket.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            if let Some(&(_, best)) = bucket.first() {
                max_score += best;
            }
            buckets.push(bucket);
        }

        // Step 6: prune by the upper bound before recursing at all.
        if max_score < session.config.delta {
            return reject(backend, session, u_uri, v_uri).await;
        }

        // Step 7: walk server pairs in insertion order, client candidates
        // within each bucket in descending score, tightening max_score on
        // every miss.
        let mut sum = 0.0_f64;
        let mut witnesses: Vec<(Uri, Uri)> = Vec::new();
        let mut remaining_max = max_score;

        for (i, sp) in server_paths.iter().enumerate() {
            let bucket = &buckets[i];
            // The bucket's best candidate is the one already folded into
            // `max_score`/`remaining_max`; track it so every miss — not
            // just the first — swaps out its contribution for the next
            // candidate's.
            let mut active = bucket.first().map(|&(_, s)| s).unwrap_or(0.0);
            for (pos, &(j, score)) in bucket.iter().enumerate() {
                let cp = &client_paths[j];
                let pair_key = (sp.next_vertex.clone(), cp.next_vertex.clone());
                let matched = match session.cache.get(&pair_key) {
                    Some((m, _)) => *m,
                    None => para_match(&mut *backend, &mut *session, &sp.next_vertex, &cp.next_vertex).await?,
                };

                if matched {
                    sum += score;
                    witnesses.push(pair_key);
                    if sum > session.config.delta {
                        session.cache.insert(key, (true, witnesses));
                        return Ok(true);
                    }
                    break;
                }

                // Miss: tighten the bound by swapping this candidate's
                // contribution for the bucket's next-best, on every miss
                // in the bucket, not just the first.
                remaining_max -= active;
                active = bucket.get(pos + 1).map(|&(_, s)| s).unwrap_or(0.0);
                remaining_max += active;
                if remaining_max < session.config.delta {
                    return reject(backend, session, u_uri, v_uri).await;
                }
            }
        }

        // Step 8: loop completed without crossing delta.
        reject(backend, session, u_uri, v_uri).await
    })
}

/// Caches `(u_uri, v_uri) -> (false, [])` and runs back-invalidation (§4.5
/// step 9): any cached entry whose witness list named this pair depended
/// on the provisional `true` sentinel this rejection overwrites, so it is
/// re-derived from scratch.
async fn reject<B: Backend>(
    backend: &mut B,
    session: &mut Session,
    u_uri: &Uri,
    v_uri: &Uri,
) -> Result<bool, MatchError> {
    session.cache.insert((u_uri.clone(), v_uri.clone()), (false, Vec::new()));

    let stale: Vec<(Uri, Uri)> = session
        .cache
        .iter()
        .filter(|(k, (_, witnesses))| {
            *k != (u_uri.clone(), v_uri.clone()) && witnesses.iter().any(|w| w == &(u_uri.clone(), v_uri.clone()))
        })
        .map(|(k, _)| k.clone())
        .collect();

    for (su, sv) in stale {
        session.cache.remove(&(su.clone(), sv.clone()));
        let _ = para_match(&mut *backend, &mut *session, &su, &sv).await?;
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::plaintext::PlaintextBackend;
    use crate::embedding::{self, mock::MockEmbedder};
    use crate::graph::{Graph, Vertex};
    use crate::predictor::mock::FirstCandidatePredictor;
    use crate::session::Config;
    use std::collections::HashMap;

    fn embed_all(embedder: &MockEmbedder, graph: &Graph) -> HashMap<Uri, Vec<f32>> {
        graph
            .vertices()
            .iter()
            .map(|v| (v.uri.clone(), embedding::normalize(&embedder.embed_one(&v.label).unwrap())))
            .collect()
    }

    #[tokio::test]
    async fn leaf_match_returns_true_without_recursion() {
        let mut server = Graph::new();
        server.add_vertex(Vertex::new("g1/a", "apple"));
        let mut client = Graph::new();
        client.add_vertex(Vertex::new("g2/a", "apple"));

        let embedder = MockEmbedder::new();
        let predictor = FirstCandidatePredictor;
        let server_emb = embed_all(&embedder, &server);
        let client_emb = embed_all(&embedder, &client);

        let mut backend = PlaintextBackend {
            server_graph: &server,
            client_graph: &client,
            server_embeddings: &server_emb,
            client_embeddings: &client_emb,
            embedder: &embedder,
            predictor: &predictor,
        };
        let mut session = Session::new(Config::default());

        let result = para_match(&mut backend, &mut session, &Uri::new("g1/a"), &Uri::new("g2/a"))
            .await
            .unwrap();
        assert!(result);
    }

    #[tokio::test]
    async fn dissimilar_roots_never_match() {
        let mut server = Graph::new();
        server.add_vertex(Vertex::new("g1/a", "apple"));
        let mut client = Graph::new();
        client.add_vertex(Vertex::new("g2/c", "car"));

        let embedder = MockEmbedder::new();
        let predictor = FirstCandidatePredictor;
        let server_emb = embed_all(&embedder, &server);
        let client_emb = embed_all(&embedder, &client);

        let mut backend = PlaintextBackend {
            server_graph: &server,
            client_graph: &client,
            server_embeddings: &server_emb,
            client_embeddings: &client_emb,
            embedder: &embedder,
            predictor: &predictor,
        };
        let mut session = Session::new(Config::default());

        let result = para_match(&mut backend, &mut session, &Uri::new("g1/a"), &Uri::new("g2/c"))
            .await
            .unwrap();
        assert!(!result);
    }

    #[tokio::test]
    async fn repeated_call_on_fresh_state_is_deterministic() {
        let mut server = Graph::new();
        server.add_vertex(Vertex::new("g1/a", "apple"));
        server.add_vertex(Vertex::new("g1/w", "worm"));
        server.add_edge(&Uri::new("g1/a"), &Uri::new("g1/w"), "eats").unwrap();

        let mut client = Graph::new();
        client.add_vertex(Vertex::new("g2/a", "apple"));
        client.add_vertex(Vertex::new("g2/c", "caterpillar"));
        client.add_edge(&Uri::new("g2/a"), &Uri::new("g2/c"), "eats").unwrap();

        let embedder = MockEmbedder::new();
        let predictor = FirstCandidatePredictor;
        let server_emb = embed_all(&embedder, &server);
        let client_emb = embed_all(&embedder, &client);

        let run = || {
            let server = &server;
            let client = &client;
            let server_emb = &server_emb;
            let client_emb = &client_emb;
            let embedder = &embedder;
            let predictor = &predictor;
            async move {
                let mut backend = PlaintextBackend {
                    server_graph: server,
                    client_graph: client,
                    server_embeddings: server_emb,
                    client_embeddings: client_emb,
                    embedder,
                    predictor,
                };
                let mut session = Session::new(Config {
                    sigma: 0.0,
                    delta: -1.0,
                    ..Config::default()
                });
                para_match(&mut backend, &mut session, &Uri::new("g1/a"), &Uri::new("g2/a"))
                    .await
                    .unwrap()
            }
        };

        let first = run().await;
        let second = run().await;
        assert_eq!(first, second);
    }
}
