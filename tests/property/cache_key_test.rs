// tests/property/cache_key_test.rs

//! Property-based tests for URL cache keys

use actproxy::core::ActionContext;
use actproxy::core::cache::{CACHE_KEY_PREFIX, CacheStrategy};
use actproxy::core::context::{Request, Session};
use proptest::prelude::*;

fn ctx(url: &str, query: &str, accept: &str) -> ActionContext {
    ActionContext::new(Request::get(url).with_query(query).with_accept(accept))
}

proptest! {
    #[test]
    fn test_global_key_is_prefixed_concatenation(
        url in "/[a-z/]{0,20}",
        query in "(\\?[a-z=&]{0,10})?",
        accept in "[a-z/*]{0,15}",
    ) {
        let key = CacheStrategy::GlobalScoped.cache_key(&ctx(&url, &query, &accept)).unwrap();
        prop_assert_eq!(key, format!("{CACHE_KEY_PREFIX}{url}{query}{accept}"));
    }

    #[test]
    fn test_session_key_embeds_session_id(
        url in "/[a-z/]{0,20}",
        id in "[a-zA-Z0-9]{1,16}",
    ) {
        let request = ctx(&url, "", "text/html");
        let global = CacheStrategy::GlobalScoped.cache_key(&request).unwrap();
        let session = CacheStrategy::SessionScoped
            .cache_key(&request.with_session(Session::new(id.clone())))
            .unwrap();

        prop_assert_eq!(session.clone(), format!("{CACHE_KEY_PREFIX}{id}{}", &global[CACHE_KEY_PREFIX.len()..]));
        prop_assert_ne!(session, global);
    }

    #[test]
    fn test_distinct_sessions_get_distinct_keys(
        url in "/[a-z/]{0,20}",
        a in "[a-z0-9]{1,12}",
        b in "[a-z0-9]{1,12}",
    ) {
        prop_assume!(a != b);
        let key = |id: &str| {
            CacheStrategy::SessionScoped
                .cache_key(&ctx(&url, "", "").with_session(Session::new(id)))
                .unwrap()
        };
        prop_assert_ne!(key(&a), key(&b));
    }
}
