use std::collections::HashMap;

#[derive(Default, Debug, Clone)]
pub struct ReqInfo {
    pub remote_host: String, // Client Host/IP
    pub host: String,        // Node Host/IP
    pub user_agent: String,  // User Agent
    pub request_id: String,  // x-amz-request-id
    pub api: String,         // API name - Heal TopLocks ForceUnlock etc.
    pub bucket_name: String, // Bucket name
    pub object_name: String, // Object name
    tags: Vec<KeyValue>,     // Any additional info not accommodated by above fields
}

#[derive(Default, Debug, Clone)]
pub struct KeyValue {
    key: String,
    val: String,
}

impl ReqInfo {
    pub fn new(remote_host: &str, api: &str, bucket: &str, object: &str) -> ReqInfo {
        ReqInfo {
            remote_host: remote_host.to_owned(),
            api: api.to_owned(),
            bucket_name: bucket.to_owned(),
            object_name: object.to_owned(),
            ..Default::default()
        }
    }

    /// Tagged copy, for logging peer failures with a `peerAddress`.
    pub fn with_tag(mut self, key: &str, val: &str) -> ReqInfo {
        self.set_tag(key, val);
        self
    }

    pub fn append_tag(&mut self, key: &str, val: &str) {
        self.tags.push(KeyValue {
            key: key.to_owned(),
            val: val.to_owned(),
        });
    }

    pub fn set_tag(&mut self, key: &str, val: &str) {
        // Search of tag key already exists in tags
        if let Some(kv) = self.tags.iter_mut().find(|kv| kv.key == key) {
            kv.val = val.to_owned();
        } else {
            // Append to the end of tags list
            self.append_tag(key, val);
        }
    }

    pub fn get_tags_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::with_capacity(self.tags.len());
        for kv in &self.tags {
            map.insert(kv.key.clone(), kv.val.clone());
        }
        map
    }
}
