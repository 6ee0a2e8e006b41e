//! 客户端凭证注入

use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tonic::Status;

/// 调用凭证
///
/// 在每次出站调用前向元数据注入凭证。内置静态令牌实现，其它
/// 凭证来源（轮换令牌、外部签发）通过同一接口扩展。
pub trait Credential: Send + Sync {
    fn attach(&self, metadata: &mut MetadataMap) -> Result<(), Status>;
}

/// 静态令牌凭证
pub struct StaticTokenCredential {
    value: MetadataValue<Ascii>,
}

impl StaticTokenCredential {
    pub fn new(token: &str) -> Result<Self, Status> {
        let value = format!("Bearer {}", token)
            .parse()
            .map_err(|_| Status::invalid_argument("access token is not valid metadata"))?;
        Ok(Self { value })
    }
}

impl Credential for StaticTokenCredential {
    fn attach(&self, metadata: &mut MetadataMap) -> Result<(), Status> {
        metadata.insert("authorization", self.value.clone());
        Ok(())
    }
}
