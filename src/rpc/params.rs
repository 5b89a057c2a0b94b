//! Request parameter shapes shared by the JSON-RPC clients.

use jsonrpsee::core::traits::ToRpcParams;
use serde::Serialize;
use serde_json::value::RawValue;

/// Sends any serializable value as the (named) params object of a request.
pub(crate) struct ObjectParams<T>(pub(crate) T);

impl<T: Serialize> ToRpcParams for ObjectParams<T> {
    fn to_rpc_params(self) -> std::result::Result<Option<Box<RawValue>>, serde_json::Error> {
        let json = serde_json::value::to_raw_value(&self.0)?;
        Ok(Some(json))
    }
}

/// Methods without arguments still get an empty params object.
pub(crate) fn empty_params() -> ObjectParams<serde_json::Map<String, serde_json::Value>> {
    ObjectParams(serde_json::Map::new())
}
