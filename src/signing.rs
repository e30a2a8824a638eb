// signing.rs — EIP-712 order/cancel signing for the Hyperliquid gateway.
//
// Two wire representations of the same action: a msgpack encoding (abbreviated
// single-letter keys) feeds the hash that gets signed, and a JSON encoding
// with explicit key insertion order goes in the request body. The venue
// re-msgpacks the JSON body server-side to verify the signature, so the JSON
// key order must match what was hashed or the recovered address is wrong.
use ethers_core::types::transaction::eip712::EIP712Domain;
use ethers_core::types::{Address, H256, U256};
use ethers_core::utils::keccak256;
use ethers_signers::{LocalWallet, Signer};
use rmp_serde::Serializer;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::GatewayError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub r: String,
    pub s: String,
    pub v: u8,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub asset: u32,
    pub is_buy: bool,
    pub limit_px: String,
    pub sz: String,
    pub reduce_only: bool,
    pub order_type: OrderTypeWire,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub enum OrderTypeWire {
    Limit(LimitOrderWire),
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderWire {
    pub tif: String,
}

#[derive(Serialize, Clone)]
pub struct ActionWire {
    pub r#type: String,
    pub orders: Vec<OrderRequest>,
    pub grouping: String,
}

#[derive(Serialize)]
struct OrderWireMsgPack {
    a: u32,
    b: bool,
    p: String,
    s: String,
    r: bool,
    t: OrderTypeWireMsgPack,
}

#[derive(Serialize)]
struct OrderTypeWireMsgPack {
    limit: LimitOrderWireMsgPack,
}

#[derive(Serialize)]
struct LimitOrderWireMsgPack {
    tif: String,
}

#[derive(Serialize)]
struct ActionMsgPack {
    r#type: String,
    orders: Vec<OrderWireMsgPack>,
    grouping: String,
}

fn domain() -> EIP712Domain {
    EIP712Domain {
        name: Some("Exchange".to_string()),
        version: Some("1".to_string()),
        chain_id: Some(U256::from(1337)),
        verifying_contract: Some(Address::zero()),
        salt: None,
    }
}

/// keccak256("\x19\x01" || domainSeparator || Agent(source, connectionId) struct hash).
fn agent_digest(action_hash: [u8; 32]) -> H256 {
    let agent_type_hash = keccak256("Agent(string source,bytes32 connectionId)".as_bytes());
    let source_hash = keccak256("a".as_bytes());

    let mut encoded = Vec::new();
    encoded.extend_from_slice(&agent_type_hash);
    encoded.extend_from_slice(&source_hash);
    encoded.extend_from_slice(&action_hash);
    let struct_hash = keccak256(&encoded);

    let mut payload = Vec::new();
    payload.extend_from_slice(&[0x19, 0x01]);
    payload.extend_from_slice(&domain().separator());
    payload.extend_from_slice(&struct_hash);
    H256::from(keccak256(&payload))
}

fn sign_digest(private_key: &str, digest: H256) -> Result<Signature, GatewayError> {
    let wallet = LocalWallet::from_str(private_key)
        .map_err(|e| GatewayError::Structural(format!("invalid private key: {}", e)))?;
    let sig = wallet
        .sign_hash(digest)
        .map_err(|e| GatewayError::Structural(format!("signing failed: {}", e)))?;
    Ok(Signature {
        r: format!("0x{:0>64x}", sig.r),
        s: format!("0x{:0>64x}", sig.s),
        v: sig.v as u8,
    })
}

fn compute_action_hash(action: &ActionWire, nonce: u64, vault_address: Option<&str>) -> [u8; 32] {
    let msgpack_orders: Vec<OrderWireMsgPack> = action
        .orders
        .iter()
        .map(|o| {
            let tif_str = match &o.order_type {
                OrderTypeWire::Limit(l) => l.tif.clone(),
            };
            OrderWireMsgPack {
                a: o.asset,
                b: o.is_buy,
                p: o.limit_px.clone(),
                s: o.sz.clone(),
                r: o.reduce_only,
                t: OrderTypeWireMsgPack {
                    limit: LimitOrderWireMsgPack { tif: tif_str },
                },
            }
        })
        .collect();

    let msgpack_action = ActionMsgPack {
        r#type: action.r#type.clone(),
        orders: msgpack_orders,
        grouping: action.grouping.clone(),
    };

    let mut buf = Vec::new();
    let mut serializer = Serializer::new(&mut buf).with_struct_map();
    msgpack_action
        .serialize(&mut serializer)
        .expect("msgpack serialization of a plain struct cannot fail");

    buf.extend_from_slice(&nonce.to_be_bytes());
    match vault_address {
        None => buf.push(0x00),
        Some(addr) => {
            buf.push(0x01);
            let addr_clean = addr.strip_prefix("0x").unwrap_or(addr);
            if let Ok(bytes) = hex::decode(addr_clean) {
                buf.extend_from_slice(&bytes);
            }
        }
    }
    keccak256(&buf)
}

fn action_to_json(action: &ActionWire) -> serde_json::Value {
    let json_orders: Vec<serde_json::Value> = action
        .orders
        .iter()
        .map(|o| {
            let tif_str = match &o.order_type {
                OrderTypeWire::Limit(l) => l.tif.clone(),
            };
            let mut order_map = serde_json::Map::new();
            order_map.insert("a".to_string(), serde_json::Value::from(o.asset));
            order_map.insert("b".to_string(), serde_json::Value::from(o.is_buy));
            order_map.insert("p".to_string(), serde_json::Value::from(o.limit_px.clone()));
            order_map.insert("s".to_string(), serde_json::Value::from(o.sz.clone()));
            order_map.insert("r".to_string(), serde_json::Value::from(o.reduce_only));
            let mut tif_map = serde_json::Map::new();
            tif_map.insert("tif".to_string(), serde_json::Value::from(tif_str));
            let mut limit_map = serde_json::Map::new();
            limit_map.insert("limit".to_string(), serde_json::Value::Object(tif_map));
            order_map.insert("t".to_string(), serde_json::Value::Object(limit_map));
            serde_json::Value::Object(order_map)
        })
        .collect();

    let mut action_map = serde_json::Map::new();
    action_map.insert("type".to_string(), serde_json::Value::from(action.r#type.clone()));
    action_map.insert("orders".to_string(), serde_json::Value::Array(json_orders));
    action_map.insert("grouping".to_string(), serde_json::Value::from(action.grouping.clone()));
    serde_json::Value::Object(action_map)
}

pub async fn sign_l1_action(
    private_key: &str,
    action: ActionWire,
    nonce: u64,
) -> Result<(Signature, serde_json::Value), GatewayError> {
    let action_hash = compute_action_hash(&action, nonce, None);
    let digest = agent_digest(action_hash);
    let signature = sign_digest(private_key, digest)?;
    Ok((signature, action_to_json(&action)))
}

pub async fn sign_cancel_action(
    private_key: &str,
    asset: u32,
    oid: u64,
    nonce: u64,
) -> Result<(Signature, serde_json::Value), GatewayError> {
    #[derive(Serialize)]
    struct CancelWireMsgPack {
        a: u32,
        o: u64,
    }
    #[derive(Serialize)]
    struct CancelActionMsgPack {
        r#type: String,
        cancels: Vec<CancelWireMsgPack>,
    }

    let msgpack_action = CancelActionMsgPack {
        r#type: "cancel".to_string(),
        cancels: vec![CancelWireMsgPack { a: asset, o: oid }],
    };
    let mut buf = Vec::new();
    let mut serializer = Serializer::new(&mut buf).with_struct_map();
    msgpack_action
        .serialize(&mut serializer)
        .expect("msgpack serialization of a plain struct cannot fail");
    buf.extend_from_slice(&nonce.to_be_bytes());
    buf.push(0x00);

    let digest = agent_digest(keccak256(&buf));
    let signature = sign_digest(private_key, digest)?;

    let mut cancel_obj = serde_json::Map::new();
    cancel_obj.insert("a".to_string(), serde_json::Value::from(asset));
    cancel_obj.insert("o".to_string(), serde_json::Value::from(oid));
    let mut action_map = serde_json::Map::new();
    action_map.insert("type".to_string(), serde_json::Value::from("cancel"));
    action_map.insert(
        "cancels".to_string(),
        serde_json::Value::Array(vec![serde_json::Value::Object(cancel_obj)]),
    );

    Ok((signature, serde_json::Value::Object(action_map)))
}

/// Cancels by the client-assigned order id rather than the venue's oid.
/// Used for reconciliation when a prior place/cancel's outcome is unknown
/// (REST timeout) and no exch_order_id was ever recorded.
pub async fn sign_cancel_by_cloid_action(
    private_key: &str,
    asset: u32,
    cloid: &str,
    nonce: u64,
) -> Result<(Signature, serde_json::Value), GatewayError> {
    #[derive(Serialize)]
    struct CancelByCloidWireMsgPack {
        asset: u32,
        cloid: String,
    }
    #[derive(Serialize)]
    struct CancelByCloidActionMsgPack {
        r#type: String,
        cancels: Vec<CancelByCloidWireMsgPack>,
    }

    let msgpack_action = CancelByCloidActionMsgPack {
        r#type: "cancelByCloid".to_string(),
        cancels: vec![CancelByCloidWireMsgPack { asset, cloid: cloid.to_string() }],
    };
    let mut buf = Vec::new();
    let mut serializer = Serializer::new(&mut buf).with_struct_map();
    msgpack_action
        .serialize(&mut serializer)
        .expect("msgpack serialization of a plain struct cannot fail");
    buf.extend_from_slice(&nonce.to_be_bytes());
    buf.push(0x00);

    let digest = agent_digest(keccak256(&buf));
    let signature = sign_digest(private_key, digest)?;

    let mut cancel_obj = serde_json::Map::new();
    cancel_obj.insert("asset".to_string(), serde_json::Value::from(asset));
    cancel_obj.insert("cloid".to_string(), serde_json::Value::from(cloid));
    let mut action_map = serde_json::Map::new();
    action_map.insert("type".to_string(), serde_json::Value::from("cancelByCloid"));
    action_map.insert(
        "cancels".to_string(),
        serde_json::Value::Array(vec![serde_json::Value::Object(cancel_obj)]),
    );

    Ok((signature, serde_json::Value::Object(action_map)))
}
