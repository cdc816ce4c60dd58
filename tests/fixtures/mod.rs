#![allow(dead_code)]

use guardrail::application::SlashingProtection;
use guardrail::foundation::{PublicKey, SigningRoot};
use guardrail::infrastructure::store::MemoryStore;

pub const GENESIS_ROOT: &str = "0x04700007fabc8282644aed6d1c7c9e21d38a03a0c4ba193f3afe428824b3a673";

pub fn public_key(tag: u8) -> PublicKey {
    PublicKey::new(vec![tag])
}

pub fn signing_root(tag: u8) -> SigningRoot {
    SigningRoot::new(vec![tag])
}

pub fn memory_engine() -> SlashingProtection<MemoryStore> {
    SlashingProtection::new(MemoryStore::new(), GENESIS_ROOT).expect("open engine")
}

pub fn registered_engine(tags: &[u8]) -> SlashingProtection<MemoryStore> {
    let engine = memory_engine();
    let keys: Vec<PublicKey> = tags.iter().map(|tag| public_key(*tag)).collect();
    engine.register_validators(&keys).expect("register validators");
    engine
}
