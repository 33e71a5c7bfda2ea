//! Function Compute data types / 函数计算数据类型

use serde::{Deserialize, Serialize};

/// Service info / 服务信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub description: String,
}

/// Published service version / 服务版本信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceVersion {
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub last_modified_time: String,
}

/// Function info / 函数信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub description: String,
}

/// Alias info / 别名信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasInfo {
    #[serde(default)]
    pub alias_name: String,
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub last_modified_time: String,
}

/// Error body returned by FC / 函数计算错误响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FcErrorBody {
    #[serde(default, rename = "ErrorCode")]
    pub error_code: String,
    #[serde(default, rename = "ErrorMessage")]
    pub error_message: String,
    #[serde(default, rename = "RequestId")]
    pub request_id: String,
}

/// A `nextToken` paginated listing / nextToken分页的列表
pub trait FcPage {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

macro_rules! fc_page {
    ($page:ident, $field:ident, $item:ty) => {
        #[derive(Debug, Default, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $page {
            #[serde(default)]
            pub $field: Vec<$item>,
            #[serde(default)]
            pub next_token: Option<String>,
        }

        impl FcPage for $page {
            type Item = $item;

            fn into_parts(self) -> (Vec<$item>, Option<String>) {
                (self.$field, self.next_token.filter(|t| !t.is_empty()))
            }
        }
    };
}

fc_page!(ServicesPage, services, ServiceInfo);
fc_page!(VersionsPage, versions, ServiceVersion);
fc_page!(FunctionsPage, functions, FunctionInfo);
fc_page!(AliasesPage, aliases, AliasInfo);
