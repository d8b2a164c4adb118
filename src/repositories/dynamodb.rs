//! DynamoDB 実装の [`MemoStore`]
//!
//! テーブル構成: `user_id` (HASH) + `memo_id` (RANGE)、属性は `title`, `content`,
//! `created_at`, `updated_at`（更新後のみ）。

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    Client,
    client::Waiters,
    config::{Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    operation::update_item::UpdateItemError,
    types::{
        AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
        ScalarAttributeType,
    },
};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use tracing::info;

use super::memo::{
    MemoFields, MemoItem, MemoKey, MemoListing, MemoStore, StoreError, StoreResult,
};
use crate::config::StoreConfig;
use crate::memo_models::millis;

const LIST_PROJECTION: &str = "memo_id, title, created_at, updated_at";
const UPDATE_CONDITION: &str = "attribute_exists(memo_id)";

type Item = HashMap<String, AttributeValue>;

pub struct DynamoMemoStore {
    client: Client,
    table_name: String,
}

/// 設定から DynamoDB クライアントを生成する
///
/// `endpoint_override` があればそのエンドポイント（DynamoDB Local など）に接続する。
pub async fn create_client(config: &StoreConfig) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(endpoint) = &config.endpoint_override {
        loader = loader.endpoint_url(endpoint.as_str());
    }
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(credentials) = &config.credentials {
        loader = loader.credentials_provider(Credentials::new(
            credentials.access_key_id.as_str(),
            credentials.secret_access_key.as_str(),
            None,
            None,
            "memo-portal",
        ));
    }
    let sdk_config = loader.load().await;
    Client::new(&sdk_config)
}

impl DynamoMemoStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Self> {
        let store = Self::new(create_client(config).await, &config.table_name);
        if config.create_table {
            store.ensure_table().await?;
        }
        Ok(store)
    }

    /// テーブルが存在しない場合のみ作成し、アクティブになるまで待つ
    pub async fn ensure_table(&self) -> anyhow::Result<()> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => return Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) => {}
            Err(err) => {
                return Err(anyhow::anyhow!("{}", DisplayErrorContext(&err)))
                    .context("Failed to describe memo table");
            }
        }

        info!(table = %self.table_name, "Creating memo table");
        self.client
            .create_table()
            .table_name(&self.table_name)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name("user_id")
                    .attribute_type(ScalarAttributeType::S)
                    .build()?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name("memo_id")
                    .attribute_type(ScalarAttributeType::S)
                    .build()?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name("user_id")
                    .key_type(KeyType::Hash)
                    .build()?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name("memo_id")
                    .key_type(KeyType::Range)
                    .build()?,
            )
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|err| anyhow::anyhow!("{}", DisplayErrorContext(&err)))
            .context("Failed to create memo table")?;

        self.client
            .wait_until_table_exists()
            .table_name(&self.table_name)
            .wait(Duration::from_secs(60))
            .await
            .map_err(|err| anyhow::anyhow!("{}", DisplayErrorContext(&err)))
            .context("Memo table did not become active")?;
        Ok(())
    }
}

fn key_attributes(key: &MemoKey) -> Item {
    HashMap::from([
        ("user_id".to_string(), AttributeValue::S(key.user_id.clone())),
        ("memo_id".to_string(), AttributeValue::S(key.memo_id.clone())),
    ])
}

fn unavailable<E: std::error::Error>(err: E) -> StoreError {
    StoreError::Unavailable(DisplayErrorContext(err).to_string())
}

fn update_failure(err: SdkError<UpdateItemError>) -> StoreError {
    match err.as_service_error() {
        Some(e) if is_missing_item(e) => StoreError::Missing,
        _ => unavailable(err),
    }
}

/// 条件 `attribute_exists(memo_id)` に失敗した = 対象の行が無い
fn is_missing_item(err: &UpdateItemError) -> bool {
    err.is_conditional_check_failed_exception()
}

#[async_trait]
impl MemoStore for DynamoMemoStore {
    async fn put_item(&self, item: &MemoItem) -> StoreResult<()> {
        let attributes: Item = to_item(item).map_err(|e| StoreError::Malformed(e.to_string()))?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(attributes))
            .send()
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn get_item(&self, key: &MemoKey) -> StoreResult<Option<MemoItem>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_attributes(key)))
            .send()
            .await
            .map_err(unavailable)?;

        output
            .item
            .map(|item| from_item(item).map_err(|e| StoreError::Malformed(e.to_string())))
            .transpose()
    }

    async fn update_item(&self, key: &MemoKey, fields: &MemoFields) -> StoreResult<()> {
        // 削除済みのキーに created_at の無い行を作らない
        self.client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_attributes(key)))
            .condition_expression(UPDATE_CONDITION)
            .update_expression("SET title = :title, content = :content, updated_at = :updated_at")
            .expression_attribute_values(":title", AttributeValue::S(fields.title.clone()))
            .expression_attribute_values(":content", AttributeValue::S(fields.content.clone()))
            .expression_attribute_values(
                ":updated_at",
                AttributeValue::S(millis::format(&fields.updated_at)),
            )
            .send()
            .await
            .map_err(update_failure)?;
        Ok(())
    }

    async fn delete_item(&self, key: &MemoKey) -> StoreResult<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key_attributes(key)))
            .send()
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn query(&self, user_id: &str) -> StoreResult<Vec<MemoListing>> {
        // ページングはここで最後まで辿る
        let mut stream = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("user_id = :user_id")
            .expression_attribute_values(":user_id", AttributeValue::S(user_id.to_string()))
            .projection_expression(LIST_PROJECTION)
            .into_paginator()
            .items()
            .send();

        let mut listings = Vec::new();
        while let Some(item) = stream.next().await {
            let item = item.map_err(unavailable)?;
            listings.push(from_item(item).map_err(|e| StoreError::Malformed(e.to_string()))?);
        }
        Ok(listings)
    }
}
