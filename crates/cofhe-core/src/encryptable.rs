//! Tree codec for arbitrarily nested encryptable inputs.
//!
//! Callers hand the encrypt pipeline a structure mixing plaintext leaves with
//! ordinary values. [`extract`] pulls the leaves out in pre-order, the
//! pipeline turns them into ciphertext handles, and [`replace`] /
//! [`replace_all`] put the results back in exactly the same positions.
//!
//! ## Traversal
//!
//! - a leaf is emitted without descending into it
//! - arrays recurse element by element
//! - objects recurse entry by entry, in insertion order
//! - scalars contribute nothing and survive unchanged

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CofheError, CofheResult, ErrorCode};
use crate::types::{EncryptableItem, FheType};
use alloy::primitives::U256;

/// Key that marks a JSON object as an encryptable leaf.
pub const ENCRYPTABLE_KEY: &str = "__encryptable";

/// A value tree whose leaves are of type `L`.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree<L> {
    Leaf(L),
    Array(Vec<Tree<L>>),
    Object(Vec<(String, Tree<L>)>),
    Scalar(Value),
}

impl<L> Tree<L> {
    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Tree::Leaf(_) => 1,
            Tree::Array(items) => items.iter().map(Tree::leaf_count).sum(),
            Tree::Object(entries) => entries.iter().map(|(_, t)| t.leaf_count()).sum(),
            Tree::Scalar(_) => 0,
        }
    }

    /// Borrow every leaf in traversal order.
    pub fn leaves(&self) -> Vec<&L> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a L>) {
        match self {
            Tree::Leaf(leaf) => out.push(leaf),
            Tree::Array(items) => items.iter().for_each(|t| t.collect_leaves(out)),
            Tree::Object(entries) => entries.iter().for_each(|(_, t)| t.collect_leaves(out)),
            Tree::Scalar(_) => {}
        }
    }
}

/// Collect all leaves of `tree` in pre-order.
pub fn extract<L: Clone>(tree: &Tree<L>) -> Vec<L> {
    tree.leaves().into_iter().cloned().collect()
}

/// Substitute leaves with `results` in traversal order.
///
/// Returns the rebuilt tree and whatever results were not consumed. Running
/// out of results is an internal error.
pub fn replace<A, B>(tree: Tree<A>, results: Vec<B>) -> CofheResult<(Tree<B>, Vec<B>)> {
    let available = results.len();
    let mut iter = results.into_iter();
    let rebuilt = replace_inner(tree, &mut iter).map_err(|e| e.with_context("available", available))?;
    Ok((rebuilt, iter.collect()))
}

/// Like [`replace`], but every result must be consumed.
pub fn replace_all<A, B>(tree: Tree<A>, results: Vec<B>) -> CofheResult<Tree<B>> {
    let (rebuilt, remainder) = replace(tree, results)?;
    if !remainder.is_empty() {
        return Err(CofheError::internal(
            "more results than encryptable leaves",
        )
        .with_context("leftover", remainder.len()));
    }
    Ok(rebuilt)
}

fn replace_inner<A, B>(tree: Tree<A>, results: &mut std::vec::IntoIter<B>) -> CofheResult<Tree<B>> {
    Ok(match tree {
        Tree::Leaf(_) => Tree::Leaf(
            results
                .next()
                .ok_or_else(|| CofheError::internal("fewer results than encryptable leaves"))?,
        ),
        Tree::Array(items) => Tree::Array(
            items
                .into_iter()
                .map(|t| replace_inner(t, results))
                .collect::<CofheResult<_>>()?,
        ),
        Tree::Object(entries) => Tree::Object(
            entries
                .into_iter()
                .map(|(k, t)| Ok((k, replace_inner(t, results)?)))
                .collect::<CofheResult<_>>()?,
        ),
        Tree::Scalar(v) => Tree::Scalar(v),
    })
}

impl<L: Serialize> Tree<L> {
    /// Render the tree back to JSON, serializing each leaf with serde.
    pub fn to_json(&self) -> CofheResult<Value> {
        Ok(match self {
            Tree::Leaf(leaf) => serde_json::to_value(leaf).map_err(|e| {
                CofheError::internal("failed to serialize tree leaf").with_cause(e)
            })?,
            Tree::Array(items) => Value::Array(
                items
                    .iter()
                    .map(Tree::to_json)
                    .collect::<CofheResult<_>>()?,
            ),
            Tree::Object(entries) => {
                let mut map = Map::new();
                for (k, t) in entries {
                    map.insert(k.clone(), t.to_json()?);
                }
                Value::Object(map)
            }
            Tree::Scalar(v) => v.clone(),
        })
    }
}

impl Tree<EncryptableItem> {
    /// Parse a JSON document into a tree of encryptable leaves.
    ///
    /// A leaf is an object whose `"__encryptable"` entry holds a utype name.
    /// Its `"value"` is a decimal or `0x` string, a non-negative integer, or
    /// a boolean. An optional `"securityZone"` sets the zone.
    pub fn from_json(value: &Value) -> CofheResult<Self> {
        Ok(match value {
            Value::Object(map) => match map.get(ENCRYPTABLE_KEY) {
                Some(tag) => Tree::Leaf(parse_leaf(tag, map)?),
                None => Tree::Object(
                    map.iter()
                        .map(|(k, v)| Ok((k.clone(), Self::from_json(v)?)))
                        .collect::<CofheResult<_>>()?,
                ),
            },
            Value::Array(items) => Tree::Array(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<CofheResult<_>>()?,
            ),
            other => Tree::Scalar(other.clone()),
        })
    }
}

fn parse_leaf(tag: &Value, map: &Map<String, Value>) -> CofheResult<EncryptableItem> {
    let name = tag.as_str().unwrap_or_default();
    let utype = FheType::from_name(name).ok_or_else(|| {
        CofheError::new(ErrorCode::InvalidUtype, format!("unknown encryptable type {tag}"))
            .with_context("utype", tag)
    })?;

    let invalid = || {
        CofheError::new(
            ErrorCode::InvalidEncryptableValue,
            format!("malformed value for encryptable {utype}"),
        )
        .with_context("utype", utype.name())
    };

    let value = match map.get("value") {
        Some(Value::String(s)) => s.parse::<U256>().map_err(|e| invalid().with_cause(e))?,
        Some(Value::Number(n)) => U256::from(n.as_u64().ok_or_else(invalid)?),
        Some(Value::Bool(b)) => U256::from(*b as u8),
        _ => return Err(invalid()),
    };

    let security_zone = match map.get("securityZone") {
        None | Some(Value::Null) => 0,
        Some(zone) => zone
            .as_u64()
            .and_then(|z| u8::try_from(z).ok())
            .ok_or_else(|| invalid().with_context("securityZone", zone))?,
    };

    Ok(EncryptableItem::new(utype, value).with_security_zone(security_zone))
}
