use serde::Deserialize;

use chymera_key::{ExtKey, ExtPubKey, KeyError, HARDENED};

#[derive(Deserialize)]
struct Vector {
    seed: String,
    chain: Vec<Node>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Node {
    path: String,
    depth: u8,
    child: u32,
    parent_fingerprint: String,
    chain_code: String,
    private_key: String,
    public_key: String,
    ext_key: String,
    ext_pub_key: String,
}

fn load_vectors() -> Vec<Vector> {
    serde_json::from_str(include_str!("testdata/bip32_vectors.json")).unwrap()
}

/// Parse the last component of `m/0H/1/...` into a child index.
fn last_index(path: &str) -> Option<u32> {
    let last = path.rsplit('/').next()?;
    if last == "m" {
        return None;
    }
    match last.strip_suffix('H') {
        Some(hardened) => Some(hardened.parse::<u32>().unwrap() | HARDENED),
        None => Some(last.parse().unwrap()),
    }
}

fn check_node(node: &Node, key: &ExtKey, xpub: &ExtPubKey) {
    assert_eq!(key.depth(), node.depth, "{}", node.path);
    assert_eq!(key.child(), node.child, "{}", node.path);
    assert_eq!(hex::encode(key.parent_fingerprint()), node.parent_fingerprint, "{}", node.path);
    assert_eq!(hex::encode(key.chain_code().as_bytes()), node.chain_code, "{}", node.path);
    assert_eq!(hex::encode(key.key().as_bytes()), node.private_key, "{}", node.path);
    assert_eq!(key.key().pub_key().to_string(), node.public_key, "{}", node.path);
    assert_eq!(hex::encode(&key.encode()[..]), node.ext_key, "{}", node.path);
    assert_eq!(hex::encode(xpub.encode()), node.ext_pub_key, "{}", node.path);
}

#[test]
fn bip32_private_derivation_chains() {
    for vector in load_vectors() {
        let mut key = ExtKey::from_seed(&hex::decode(&vector.seed).unwrap()).unwrap();
        for node in &vector.chain {
            if let Some(index) = last_index(&node.path) {
                key = key.derive(index).unwrap();
            }
            check_node(node, &key, &key.neuter());
        }
    }
}

#[test]
fn bip32_public_derivation_follows_private() {
    for vector in load_vectors() {
        let mut key = ExtKey::from_seed(&hex::decode(&vector.seed).unwrap()).unwrap();
        let mut xpub = key.neuter();
        for node in &vector.chain {
            if let Some(index) = last_index(&node.path) {
                key = key.derive(index).unwrap();
                xpub = if index & HARDENED == 0 {
                    xpub.derive(index).unwrap()
                } else {
                    assert!(matches!(
                        xpub.derive(index),
                        Err(KeyError::HardenedFromPublic(_))
                    ));
                    key.neuter()
                };
            }
            check_node(node, &key, &xpub);
        }
    }
}

#[test]
fn bip32_decode_reproduces_nodes() {
    for vector in load_vectors() {
        for node in &vector.chain {
            let key = ExtKey::decode(&hex::decode(&node.ext_key).unwrap()).unwrap();
            let xpub = ExtPubKey::decode(&hex::decode(&node.ext_pub_key).unwrap()).unwrap();
            assert_eq!(key.neuter(), xpub, "{}", node.path);
            check_node(node, &key, &xpub);
        }
    }
}
