mod common;

use ::common::share::Expiry;
use rand::Rng;
use storage::ListQuery;

use crate::common::{credentials, now_ms, setup, ONE_HOUR_MS};
use service::{RecipientOp, RecipientOutput, ShareError};

#[tokio::test]
async fn test_share_grant_list_download_revoke() {
    let svc = setup();
    svc.put_object("docs", "readme.txt", b"hello bob").await;
    let creds = credentials();

    let minted = svc
        .state
        .manager()
        .create_share(&creds, "docs", "for Bob", Expiry::At(now_ms() + ONE_HOUR_MS))
        .await
        .unwrap();
    assert!(minted.url.is_none());

    let ctx = svc.state.gateway().authorize(&minted.token, None).await.unwrap();
    assert_eq!(ctx.share_id(), minted.id);
    assert_eq!(ctx.bucket_name(), "docs");

    let listing = svc
        .state
        .executor()
        .execute(&ctx, RecipientOp::List(ListQuery::default()))
        .await
        .unwrap();
    let RecipientOutput::Listing(page) = listing else {
        panic!("expected a listing");
    };
    let keys: Vec<_> = page.contents.iter().map(|o| o.key.as_str()).collect();
    assert_eq!(keys, vec!["readme.txt"]);
    // the record prefix is an ordinary folder to the recipient
    assert_eq!(page.common_prefixes.len(), 1);
    assert_eq!(page.common_prefixes[0].prefix, ".garage/");

    let download = svc
        .state
        .executor()
        .execute(
            &ctx,
            RecipientOp::PresignGet {
                key: "readme.txt".to_string(),
            },
        )
        .await
        .unwrap();
    let RecipientOutput::Download(reference) = download else {
        panic!("expected a download reference");
    };
    assert!(reference.url.starts_with("/s3-proxy/"));
    assert!(reference.url.contains("/docs/readme.txt?"));
    assert!(!reference.url.contains("localhost"));

    svc.state
        .manager()
        .revoke_share(&creds, "docs", minted.id)
        .await
        .unwrap();
    assert!(matches!(
        svc.state.gateway().authorize(&minted.token, None).await,
        Err(ShareError::NotFound(id)) if id == minted.id
    ));
}

#[tokio::test]
async fn test_regenerated_tokens_share_one_record() {
    let svc = setup();
    let creds = credentials();
    let manager = svc.state.manager();

    let first = manager
        .create_share(&creds, "docs", "team", Expiry::Never)
        .await
        .unwrap();
    let second = manager
        .regenerate_share_token(&creds, "docs", first.id)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_ne!(first.token, second.token);

    for token in [&first.token, &second.token] {
        assert!(svc.state.gateway().authorize(token, None).await.is_ok());
    }

    manager.revoke_share(&creds, "docs", first.id).await.unwrap();
    for token in [&first.token, &second.token] {
        assert!(svc.state.gateway().authorize(token, None).await.is_err());
    }

    // revoking again is fine, regenerating is not
    manager.revoke_share(&creds, "docs", first.id).await.unwrap();
    assert!(matches!(
        manager.regenerate_share_token(&creds, "docs", first.id).await,
        Err(ShareError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_expiry_follows_the_record() {
    let svc = setup();
    let creds = credentials();
    let manager = svc.state.manager();

    let minted = manager
        .create_share(&creds, "docs", "short lived", Expiry::At(now_ms() + ONE_HOUR_MS))
        .await
        .unwrap();

    manager
        .update_share(&creds, "docs", minted.id, Expiry::At(now_ms() - 1))
        .await
        .unwrap();
    assert!(matches!(
        svc.state.gateway().authorize(&minted.token, None).await,
        Err(ShareError::Expired(_))
    ));

    // the same token works again once the record is extended
    let updated = manager
        .update_share(&creds, "docs", minted.id, Expiry::Never)
        .await
        .unwrap();
    assert_eq!(updated.expires_at, Expiry::Never);
    assert_eq!(updated.memo, "short lived");
    assert!(svc.state.gateway().authorize(&minted.token, None).await.is_ok());
}

#[tokio::test]
async fn test_token_is_confined_to_its_bucket() {
    let svc = setup();
    let creds = credentials();
    svc.put_object("photos", "cat.jpg", b"meow").await;

    let minted = svc
        .state
        .manager()
        .create_share(&creds, "docs", "docs only", Expiry::Never)
        .await
        .unwrap();

    assert!(matches!(
        svc.state.gateway().authorize(&minted.token, Some("photos")).await,
        Err(ShareError::Authorization)
    ));

    let ctx = svc
        .state
        .gateway()
        .authorize(&minted.token, Some("docs"))
        .await
        .unwrap();
    let RecipientOutput::Listing(page) = svc
        .state
        .executor()
        .execute(&ctx, RecipientOp::List(ListQuery::default()))
        .await
        .unwrap()
    else {
        panic!("expected a listing");
    };
    assert!(page.contents.iter().all(|o| o.key != "cat.jpg"));
}

#[tokio::test]
async fn test_listing_pages_through_a_large_folder() {
    let svc = setup();
    let creds = credentials();
    for key in ["a/1", "a/2", "a/3", "a/4", "a/5"] {
        svc.put_object("docs", key, b"x").await;
    }
    let minted = svc
        .state
        .manager()
        .create_share(&creds, "docs", "paged", Expiry::Never)
        .await
        .unwrap();
    let ctx = svc.state.gateway().authorize(&minted.token, None).await.unwrap();

    let mut query = ListQuery {
        prefix: "a/".to_string(),
        max_keys: 2,
        ..Default::default()
    };
    let mut seen = Vec::new();
    loop {
        let page = svc.state.executor().list_objects(&ctx, &query).await.unwrap();
        seen.extend(page.contents.into_iter().map(|o| o.key));
        match page.next_continuation_token {
            Some(token) => {
                assert!(page.is_truncated);
                query.continuation_token = Some(token);
            }
            None => break,
        }
    }
    assert_eq!(seen, vec!["a/1", "a/2", "a/3", "a/4", "a/5"]);
}

#[tokio::test]
async fn test_listing_shares_never_exposes_credentials() {
    let svc = setup();
    let creds = credentials();
    let manager = svc.state.manager();
    manager
        .create_share(&creds, "docs", "one", Expiry::Never)
        .await
        .unwrap();
    manager
        .create_share(&creds, "docs", "two", Expiry::At(now_ms() + ONE_HOUR_MS))
        .await
        .unwrap();

    let records = manager.list_shares(&creds, "docs").await.unwrap();
    assert_eq!(records.len(), 2);

    let stored = svc
        .bucket("docs")
        .list_keys(".garage/shares/")
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
    for key in stored {
        let raw = svc.bucket("docs").get(&key).await.unwrap().unwrap();
        let raw = String::from_utf8(raw.to_vec()).unwrap();
        assert!(!raw.contains(&creds.secret_access_key));
        assert!(!raw.contains(&creds.access_key_id));
    }
}

#[tokio::test]
async fn test_tampered_tokens_are_rejected() {
    let svc = setup();
    let minted = svc
        .state
        .manager()
        .create_share(&credentials(), "docs", "tamper", Expiry::Never)
        .await
        .unwrap();

    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    let mut rng = rand::rng();
    for _ in 0..64 {
        let mut bytes = minted.token.clone().into_bytes();
        let idx = loop {
            let idx = rng.random_range(0..bytes.len());
            if bytes[idx] != b'.' {
                break idx;
            }
        };
        let replacement = loop {
            let c = ALPHABET[rng.random_range(0..ALPHABET.len())];
            if c != bytes[idx] {
                break c;
            }
        };
        bytes[idx] = replacement;
        let tampered = String::from_utf8(bytes).unwrap();

        let result = svc.state.gateway().authorize(&tampered, None).await;
        assert!(
            matches!(
                result,
                Err(ShareError::Decode(_)) | Err(ShareError::Authentication)
            ),
            "tampered token accepted at byte {}",
            idx
        );
    }
}
