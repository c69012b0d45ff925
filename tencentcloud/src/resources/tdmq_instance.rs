//! TDMQ (Pulsar) cluster

use std::collections::HashMap;

use async_trait::async_trait;
use tfplug::request::{
    CreateRequest, CreateResponse, DeleteRequest, DeleteResponse, ReadRequest, ReadResponse,
    ResourceSchemaResponse, SchemaRequest, UpdateRequest, UpdateResponse,
};
use tfplug::schema::AttributeType;
use tfplug::validator::StringLengthValidator;
use tfplug::{
    AttributeBuilder, Context, Diagnostics, Resource, ResourceSchema, SchemaBuilder, State,
};

use super::{api_error, changed, reject_immutable, set_tags, state_tags, sync_tags, TagTarget};
use crate::api::tdmq::{Cluster, CreateClusterRequest, TdmqTag};
use crate::api::ApiError;
use crate::provider_data::TencentCloudProviderData;

const TYPE_NAME: &str = "tencentcloud_tdmq_instance";
const TAGS: TagTarget = TagTarget {
    service: "tdmq",
    resource_type: "cluster",
};

pub struct TdmqInstanceResource {
    provider_data: TencentCloudProviderData,
}

impl TdmqInstanceResource {
    pub fn new(provider_data: TencentCloudProviderData) -> Self {
        Self { provider_data }
    }

    pub fn schema_static() -> ResourceSchema {
        SchemaBuilder::new()
            .description("Provides a TDMQ Pulsar cluster")
            .attribute(
                "id",
                AttributeBuilder::string("id")
                    .computed()
                    .use_state_for_unknown(),
            )
            .attribute(
                "cluster_name",
                AttributeBuilder::string("cluster_name")
                    .required()
                    .validator(Box::new(StringLengthValidator {
                        min: Some(1),
                        max: Some(64),
                    }))
                    .description("Name of the cluster"),
            )
            .attribute(
                "bind_cluster_id",
                AttributeBuilder::number("bind_cluster_id")
                    .optional()
                    .description("Dedicated physical cluster to bind to"),
            )
            .attribute(
                "remark",
                AttributeBuilder::string("remark")
                    .optional()
                    .description("Free-form description"),
            )
            .attribute(
                "tags",
                AttributeBuilder::map("tags", AttributeType::String).optional(),
            )
            .build_resource(0)
    }

    async fn read_state(
        &self,
        ctx: &Context,
        cluster_id: &str,
        mut state: State,
    ) -> Result<Option<State>, ApiError> {
        let cluster = match self
            .provider_data
            .client
            .tdmq()
            .describe_cluster_by_id(ctx, cluster_id)
            .await?
        {
            Some(cluster) => cluster,
            None => return Ok(None),
        };
        flatten_cluster(&cluster, &mut state);
        Ok(Some(state))
    }
}

fn flatten_cluster(cluster: &Cluster, state: &mut State) {
    state.set_string("id", cluster.cluster_id.clone());
    state.set_string("cluster_name", cluster.cluster_name.clone());
    if cluster.remark.is_empty() {
        state.set_null("remark");
    } else {
        state.set_string("remark", cluster.remark.clone());
    }
    let tags: HashMap<String, String> = cluster
        .tags
        .iter()
        .map(|t| (t.tag_key.clone(), t.tag_value.clone()))
        .collect();
    set_tags(state, tags);
}

#[async_trait]
impl Resource for TdmqInstanceResource {
    async fn schema(&self, _request: SchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn create(&self, request: CreateRequest) -> CreateResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let mut state = request.planned_state;

        let create = CreateClusterRequest {
            cluster_name: state.get_string("cluster_name").unwrap_or_default(),
            bind_cluster_id: state.get_i64("bind_cluster_id"),
            remark: state.get_string("remark"),
            tags: state_tags(&state)
                .into_iter()
                .map(|(tag_key, tag_value)| TdmqTag { tag_key, tag_value })
                .collect(),
        };

        let cluster_id = match self.provider_data.client.tdmq().create_cluster(ctx, &create).await {
            Ok(id) => id,
            Err(e) => {
                api_error(&mut diags, "Failed to create TDMQ cluster", e);
                return CreateResponse {
                    state,
                    diagnostics: diags,
                };
            }
        };
        tracing::info!("[{}.create] created cluster {}", TYPE_NAME, cluster_id);
        state.set_string("id", cluster_id.clone());

        match self.read_state(ctx, &cluster_id, state.clone()).await {
            Ok(Some(state)) => CreateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("TDMQ cluster not found after creation", Some(cluster_id));
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read TDMQ cluster", e);
                CreateResponse {
                    state,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> ReadResponse {
        let mut diags = Diagnostics::new();
        let cluster_id = request.current_state.get_string("id").unwrap_or_default();

        match self
            .read_state(&request.context, &cluster_id, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => ReadResponse {
                state: Some(state),
                diagnostics: diags,
            },
            Ok(None) => {
                tracing::warn!(
                    "[{}.read] cluster {} not found, removing from state",
                    TYPE_NAME,
                    cluster_id
                );
                ReadResponse {
                    state: None,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read TDMQ cluster", e);
                ReadResponse {
                    state: Some(request.current_state),
                    diagnostics: diags,
                }
            }
        }
    }

    async fn update(&self, request: UpdateRequest) -> UpdateResponse {
        let mut diags = Diagnostics::new();
        let ctx = &request.context;
        let planned = request.planned_state;
        let prior = request.current_state;
        let client = &self.provider_data.client;

        if reject_immutable(&planned, &prior, &["bind_cluster_id"], &mut diags) {
            return UpdateResponse {
                state: prior,
                diagnostics: diags,
            };
        }
        let cluster_id = prior.get_string("id").unwrap_or_default();

        if changed(&planned, &prior, "cluster_name") || changed(&planned, &prior, "remark") {
            let name = planned.get_string("cluster_name").unwrap_or_default();
            let remark = planned.get_string("remark");
            if let Err(e) = client
                .tdmq()
                .modify_cluster(ctx, &cluster_id, &name, remark.as_deref())
                .await
            {
                api_error(&mut diags, "Failed to modify TDMQ cluster", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        if changed(&planned, &prior, "tags") {
            if let Err(e) = sync_tags(
                client,
                ctx,
                TAGS,
                &cluster_id,
                &state_tags(&prior),
                &state_tags(&planned),
            )
            .await
            {
                api_error(&mut diags, "Failed to modify TDMQ cluster tags", e);
                return UpdateResponse {
                    state: prior,
                    diagnostics: diags,
                };
            }
        }

        match self.read_state(ctx, &cluster_id, planned.clone()).await {
            Ok(Some(state)) => UpdateResponse {
                state,
                diagnostics: diags,
            },
            Ok(None) => {
                diags.add_error("TDMQ cluster not found after update", Some(cluster_id));
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
            Err(e) => {
                api_error(&mut diags, "Failed to read TDMQ cluster", e);
                UpdateResponse {
                    state: planned,
                    diagnostics: diags,
                }
            }
        }
    }

    async fn delete(&self, request: DeleteRequest) -> DeleteResponse {
        let mut diags = Diagnostics::new();
        let cluster_id = request.current_state.get_string("id").unwrap_or_default();
        match self
            .provider_data
            .client
            .tdmq()
            .delete_cluster(&request.context, &cluster_id)
            .await
        {
            Ok(()) => tracing::info!("[{}.delete] deleted cluster {}", TYPE_NAME, cluster_id),
            Err(e) if e.is_not_found() => {}
            Err(e) => api_error(&mut diags, "Failed to delete TDMQ cluster", e),
        }
        DeleteResponse { diagnostics: diags }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::resources::test_support::provider_data;
    use mockito::Matcher;

    fn cluster_state() -> State {
        let mut state = State::new();
        state.set_string("id", "pulsar-1");
        state.set_string("cluster_name", "events");
        state.set_i64("bind_cluster_id", 1);
        state.set_null("remark");
        state.set_null("tags");
        state
    }

    #[tokio::test]
    async fn bind_cluster_change_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let any = server.mock("POST", "/").expect(0).create_async().await;

        let prior = cluster_state();
        let mut planned = prior.clone();
        planned.set_i64("bind_cluster_id", 2);

        let resource = TdmqInstanceResource::new(provider_data(&server.url()));
        let response = resource
            .update(UpdateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: planned,
                current_state: prior,
            })
            .await;

        assert_eq!(
            response.diagnostics.errors[0].attribute.as_deref(),
            Some("bind_cluster_id")
        );
        any.assert_async().await;
    }

    #[tokio::test]
    async fn remark_change_sends_name_and_remark() {
        let mut server = mockito::Server::new_async().await;
        let modify = server
            .mock("POST", "/")
            .match_header("x-tc-action", "ModifyCluster")
            .match_body(Matcher::Json(serde_json::json!({
                "ClusterId": "pulsar-1",
                "ClusterName": "events",
                "Remark": "prod events"
            })))
            .with_body(r#"{"Response":{"RequestId":"r"}}"#)
            .create_async()
            .await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeClusters")
            .with_body(
                r#"{"Response":{"TotalCount":1,"ClusterSet":[{"ClusterId":"pulsar-1","ClusterName":"events","Remark":"prod events"}],"RequestId":"r"}}"#,
            )
            .create_async()
            .await;

        let prior = cluster_state();
        let mut planned = prior.clone();
        planned.set_string("remark", "prod events");

        let resource = TdmqInstanceResource::new(provider_data(&server.url()));
        let response = resource
            .update(UpdateRequest {
                context: Context::new(),
                config: Default::default(),
                planned_state: planned,
                current_state: prior,
            })
            .await;

        assert!(!response.diagnostics.has_errors());
        assert_eq!(response.state.get_string("remark").as_deref(), Some("prod events"));
        assert_eq!(response.state.get_i64("bind_cluster_id"), Some(1));
        modify.assert_async().await;
    }

    #[tokio::test]
    async fn read_of_deleted_cluster_clears_state() {
        let mut server = mockito::Server::new_async().await;
        let _describe = server
            .mock("POST", "/")
            .match_header("x-tc-action", "DescribeClusters")
            .with_body(r#"{"Response":{"TotalCount":0,"ClusterSet":[],"RequestId":"r"}}"#)
            .create_async()
            .await;

        let resource = TdmqInstanceResource::new(provider_data(&server.url()));
        let response = resource
            .read(ReadRequest {
                context: Context::new(),
                current_state: cluster_state(),
            })
            .await;

        assert!(response.state.is_none());
    }
}
