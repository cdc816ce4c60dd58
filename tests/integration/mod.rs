mod concurrent_decisions;
mod interchange_roundtrip;
mod signing_flow;
