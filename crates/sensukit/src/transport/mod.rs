//! Transport abstraction for the API client.
//!
//! The [`Transport`] trait hides the HTTP stack from [`crate::Client`]. The
//! production implementation is [`http::HttpTransport`]; [`MockTransport`] is
//! an in-memory Sensu backend used in tests.
//!
//! # Testing
//!
//! ```
//! use sensukit::{Client, ClientConfig, Method, RequestOptions};
//! use sensukit::transport::MockTransport;
//! use serde_json::json;
//!
//! let mock = MockTransport::new();
//! mock.seed(Some("default"), "checks", json!({"metadata": {"name": "ping"}, "command": "true"}));
//!
//! let client = Client::with_transport(ClientConfig::default(), Box::new(mock.clone()));
//! let checks = client
//!     .request("checks", None, &RequestOptions::new(Method::Get).namespace(Some("default")))
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(checks.as_array().unwrap().len(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{CORE_API_GROUP, ClusterMember, HttpRequest, HttpResponse, Method};
use base64::Engine;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Sends a fully built request and returns the raw response.
///
/// Implementations return `Err` only for transport failures; HTTP error
/// statuses come back as a normal [`HttpResponse`].
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

#[derive(Debug)]
enum Scripted {
    Response(HttpResponse),
    ConnectionError(String),
}

#[derive(Debug)]
struct MockState {
    username: String,
    password: String,
    tokens: HashSet<String>,
    issued: u32,
    reject_tokens: bool,
    collections: BTreeMap<String, Vec<Value>>,
    scripted: VecDeque<Scripted>,
    requests: Vec<HttpRequest>,
    members: Vec<ClusterMember>,
    next_member_id: u64,
}

impl Default for MockState {
    fn default() -> Self {
        let mut collections = BTreeMap::new();
        collections.insert(
            collection_key(CORE_API_GROUP, None, "namespaces"),
            vec![json!({"name": "default"})],
        );
        Self {
            username: "admin".to_string(),
            password: "P@ssw0rd!".to_string(),
            tokens: HashSet::new(),
            issued: 0,
            reject_tokens: false,
            collections,
            scripted: VecDeque::new(),
            requests: Vec::new(),
            members: Vec::new(),
            next_member_id: 0x8e9e_05c5_2164_694d,
        }
    }
}

/// In-memory Sensu backend.
///
/// Understands the login endpoint, namespaced and cluster-scoped collections
/// for any API group, and records every request it receives. Clones share
/// state, so a test can keep a handle after giving one to a client.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Path of a request split into its routing parts, with segments decoded.
#[derive(Debug)]
struct Route {
    group: String,
    namespace: Option<String>,
    collection: String,
    /// Object name; events are addressed as `<entity>/<check>`
    name: Option<String>,
}

/// Path of the cluster members endpoint.
const MEMBERS_PATH: &str = "/api/core/v2/cluster/members";

fn collection_key(group: &str, namespace: Option<&str>, collection: &str) -> String {
    format!("{}|{}|{}", group, namespace.unwrap_or(""), collection)
}

fn url_path(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = rest.find('/').map_or("/", |i| &rest[i..]);
    path.split_once('?').map_or(path, |(path, _)| path)
}

fn query_param(url: &str, key: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| percent_decode(k) == key)
        .map(|(_, v)| percent_decode(v))
}

fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let hex = (bytes[i] == b'%')
            .then(|| segment.get(i + 1..i + 3))
            .flatten()
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match hex {
            Some(byte) => {
                decoded.push(byte);
                i += 3;
            }
            None => {
                decoded.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn parse_route(path: &str) -> Option<Route> {
    let segments: Vec<String> = path.trim_matches('/').split('/').map(percent_decode).collect();
    if segments.first().map(String::as_str) != Some("api") {
        return None;
    }
    let version = segments.iter().position(|s| is_version_segment(s))?;
    let group = segments[1..=version].join("/");
    let rest = &segments[version + 1..];

    match rest {
        [ns, namespace, collection, tail @ ..] if ns == "namespaces" && tail.len() <= 2 => Some(Route {
            group,
            namespace: Some(namespace.clone()),
            collection: collection.clone(),
            name: (!tail.is_empty()).then(|| tail.join("/")),
        }),
        [collection] => Some(Route {
            group,
            namespace: None,
            collection: collection.clone(),
            name: None,
        }),
        [collection, name] => Some(Route {
            group,
            namespace: None,
            collection: collection.clone(),
            name: Some(name.clone()),
        }),
        _ => None,
    }
}

/// Name of an object as the backend keys it. Events have no name of their
/// own and are keyed by entity and check.
fn object_name(object: &Value) -> Option<String> {
    let name = object
        .pointer("/metadata/name")
        .or_else(|| object.get("name"))
        .or_else(|| object.get("username"))
        .and_then(Value::as_str);
    if let Some(name) = name {
        return Some(name.to_string());
    }
    let entity = object.pointer("/entity/metadata/name")?.as_str()?;
    let check = object.pointer("/check/metadata/name")?.as_str()?;
    Some(format!("{entity}/{check}"))
}

fn position(objects: &[Value], name: &str) -> Option<usize> {
    objects.iter().position(|o| object_name(o).as_deref() == Some(name))
}

fn empty(status: u16) -> HttpResponse {
    HttpResponse::new(status, "")
}

fn error_body(status: u16, message: &str) -> HttpResponse {
    HttpResponse::new(status, json!({"message": message}).to_string())
}

impl MockTransport {
    /// Create a backend with only the `default` namespace and the default
    /// `admin` credentials.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the accepted login credentials.
    pub fn with_credentials(self, username: &str, password: &str) -> Self {
        {
            let mut state = self.state();
            state.username = username.to_string();
            state.password = password.to_string();
        }
        self
    }

    /// Register a namespace.
    pub fn add_namespace(&self, name: &str) {
        self.seed(None, "namespaces", json!({"name": name}));
    }

    /// Store an object in a `core/v2` collection.
    pub fn seed(&self, namespace: Option<&str>, collection: &str, object: Value) {
        self.seed_in(CORE_API_GROUP, namespace, collection, object);
    }

    /// Store an object in a collection of any API group.
    pub fn seed_in(&self, group: &str, namespace: Option<&str>, collection: &str, object: Value) {
        let mut state = self.state();
        let key = collection_key(group, namespace, collection);
        let objects = state.collections.entry(key).or_default();
        let name = object_name(&object);
        objects.retain(|o| object_name(o) != name);
        objects.push(object);
    }

    /// Objects currently stored in a `core/v2` collection.
    pub fn objects(&self, namespace: Option<&str>, collection: &str) -> Vec<Value> {
        self.objects_in(CORE_API_GROUP, namespace, collection)
    }

    /// Objects currently stored in a collection of any API group.
    pub fn objects_in(&self, group: &str, namespace: Option<&str>, collection: &str) -> Vec<Value> {
        self.state()
            .collections
            .get(&collection_key(group, namespace, collection))
            .cloned()
            .unwrap_or_default()
    }

    /// A single stored `core/v2` object.
    pub fn object(&self, namespace: Option<&str>, collection: &str, name: &str) -> Option<Value> {
        self.objects(namespace, collection)
            .into_iter()
            .find(|o| object_name(o).as_deref() == Some(name))
    }

    /// Add a started member to the etcd cluster and return its id.
    pub fn add_member(&self, name: &str, peer_urls: &[&str]) -> u64 {
        let mut state = self.state();
        let id = state.next_member_id;
        state.next_member_id += 1;
        state.members.push(ClusterMember {
            id,
            name: name.to_string(),
            peer_urls: peer_urls.iter().map(|u| (*u).to_string()).collect(),
            client_urls: Vec::new(),
        });
        id
    }

    /// Current etcd cluster members.
    pub fn members(&self) -> Vec<ClusterMember> {
        self.state().members.clone()
    }

    /// Queue a canned response for the next request.
    pub fn push_response(&self, response: HttpResponse) {
        self.state().scripted.push_back(Scripted::Response(response));
    }

    /// Queue a transport failure for the next request.
    pub fn push_connection_error(&self, message: &str) {
        self.state()
            .scripted
            .push_back(Scripted::ConnectionError(message.to_string()));
    }

    /// Forget every issued token, as if they all expired.
    pub fn expire_tokens(&self) {
        self.state().tokens.clear();
    }

    /// Reject every bearer token, even freshly issued ones.
    pub fn reject_tokens(&self, reject: bool) {
        self.state().reject_tokens = reject;
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state().requests.clone()
    }

    /// Received requests that modify state (POST, PUT, DELETE).
    pub fn writes(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !r.method.is_read())
            .collect()
    }

    /// Number of login calls received.
    pub fn login_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| url_path(&r.url) == "/auth")
            .count()
    }

    /// Drop the request log.
    pub fn clear_requests(&self) {
        self.state().requests.clear();
    }

    fn login(state: &mut MockState, request: &HttpRequest) -> HttpResponse {
        let expected = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", state.username, state.password))
        );
        if request.authorization.as_deref() != Some(expected.as_str()) {
            return error_body(401, "unauthorized");
        }
        state.issued += 1;
        let token = format!("token-{}", state.issued);
        state.tokens.insert(token.clone());
        let body = json!({
            "access_token": token,
            "refresh_token": format!("refresh-{}", state.issued),
            "expires_at": 0,
        });
        HttpResponse::new(200, body.to_string())
    }

    fn authorized(state: &MockState, request: &HttpRequest) -> bool {
        if state.reject_tokens {
            return false;
        }
        request
            .authorization
            .as_deref()
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| state.tokens.contains(token))
    }

    fn namespace_exists(state: &MockState, namespace: &str) -> bool {
        state
            .collections
            .get(&collection_key(CORE_API_GROUP, None, "namespaces"))
            .is_some_and(|all| all.iter().any(|o| object_name(o).as_deref() == Some(namespace)))
    }

    fn cluster_members(state: &mut MockState, request: &HttpRequest, id: Option<&str>) -> HttpResponse {
        let list = |state: &MockState| json!({"header": {"cluster_id": 1}, "members": state.members});
        let peer_urls = || -> Option<Vec<String>> {
            let addrs = query_param(&request.url, "peer-addrs")?;
            Some(addrs.split(',').map(str::to_string).collect())
        };
        let id = match id.map(|id| u64::from_str_radix(id, 16)) {
            Some(Ok(id)) => Some(id),
            Some(Err(_)) => return error_body(400, "invalid member id"),
            None => None,
        };
        let index = id.and_then(|id| state.members.iter().position(|m| m.id == id));

        match (request.method, id, index) {
            (Method::Get, None, _) => HttpResponse::new(200, list(&*state).to_string()),
            (Method::Post, None, _) => {
                let Some(peer_urls) = peer_urls() else {
                    return error_body(400, "missing peer-addrs");
                };
                let member = ClusterMember {
                    id: state.next_member_id,
                    name: String::new(),
                    peer_urls,
                    client_urls: Vec::new(),
                };
                state.next_member_id += 1;
                state.members.push(member.clone());
                let mut body = list(&*state);
                body["member"] = json!(member);
                HttpResponse::new(201, body.to_string())
            }
            (Method::Put, Some(_), Some(i)) => {
                let Some(peer_urls) = peer_urls() else {
                    return error_body(400, "missing peer-addrs");
                };
                state.members[i].peer_urls = peer_urls;
                HttpResponse::new(200, list(&*state).to_string())
            }
            (Method::Delete, Some(_), Some(i)) => {
                state.members.remove(i);
                HttpResponse::new(200, list(&*state).to_string())
            }
            (_, Some(_), None) => error_body(404, "member not found"),
            _ => error_body(405, "method not allowed"),
        }
    }

    fn route(state: &mut MockState, request: &HttpRequest, route: &Route) -> HttpResponse {
        if let Some(namespace) = route.namespace.as_deref()
            && !Self::namespace_exists(state, namespace)
        {
            return error_body(404, &format!("namespace {namespace} not found"));
        }

        let key = collection_key(&route.group, route.namespace.as_deref(), &route.collection);
        let objects = state.collections.entry(key).or_default();

        match (request.method, route.name.as_deref()) {
            (Method::Get, None) => HttpResponse::new(200, Value::Array(objects.clone()).to_string()),
            (Method::Get, Some(name)) => match position(objects, name) {
                Some(i) => HttpResponse::new(200, objects[i].to_string()),
                None => error_body(404, "not found"),
            },
            (Method::Post | Method::Put, _) => {
                let Some(mut body) = request.body.clone() else {
                    return error_body(400, "missing body");
                };
                let Some(name) = object_name(&body) else {
                    return error_body(400, "missing name");
                };
                if let Some(expected) = route.name.as_deref()
                    && expected != name
                {
                    return error_body(400, "name does not match path");
                }
                if let Some(namespace) = route.namespace.as_deref()
                    && let Some(metadata) = body.get_mut("metadata").and_then(Value::as_object_mut)
                {
                    metadata.insert("namespace".to_string(), json!(namespace));
                    metadata.insert("created_by".to_string(), json!("admin"));
                }
                match position(objects, &name) {
                    Some(_) if request.method == Method::Post => {
                        error_body(409, "resource already exists")
                    }
                    Some(i) => {
                        objects[i] = body;
                        empty(201)
                    }
                    None => {
                        objects.push(body);
                        empty(201)
                    }
                }
            }
            (Method::Delete, Some(name)) => match position(objects, name) {
                Some(i) => {
                    objects.remove(i);
                    empty(204)
                }
                None => error_body(404, "not found"),
            },
            (Method::Delete, None) => error_body(405, "method not allowed"),
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut state = self.state();
        state.requests.push(request.clone());

        if let Some(scripted) = state.scripted.pop_front() {
            return match scripted {
                Scripted::Response(response) => Ok(response),
                Scripted::ConnectionError(message) => Err(Error::connection(message)),
            };
        }

        let path = url_path(&request.url);
        match path {
            "/auth" => Ok(Self::login(&mut state, request)),
            "/info" | "/health" | "/version" => Ok(HttpResponse::new(200, r#"{"etcd":{},"sensu_backend":"6"}"#)),
            _ => {
                if !Self::authorized(&state, request) {
                    return Ok(error_body(401, "unauthorized"));
                }
                if let Some(rest) = path.strip_prefix(MEMBERS_PATH)
                    && (rest.is_empty() || rest.starts_with('/'))
                {
                    let id = rest.strip_prefix('/').filter(|id| !id.is_empty());
                    return Ok(Self::cluster_members(&mut state, request, id));
                }
                match parse_route(path) {
                    Some(route) => Ok(Self::route(&mut state, request, &route)),
                    None => Ok(error_body(404, "no such route")),
                }
            }
        }
    }
}
