//! End-to-end negotiation scenarios against the mock providers.
//!
//! Each test drives a full session: candidate enumeration, background
//! resolution, credential acquisition, and the labelling operations.

use std::sync::Arc;
use std::time::Duration;

use netauth::mechanism::cache_config;
use netauth::{
    AcquireOptions, ClientInfo, Error, GssCredential, GssdClientType, InfoKey, KrbPrincipal,
    MechOid, Mechanism, Selection, ServerHints, Session, UserSelection, WELLKNOWN_LKDC_REALM,
};
use netauth_testing::{
    Gate, MockCredCache, MockKerberos, MockNtlm, MockPreferences, TestCertificate, TestEnv,
};

fn find(
    selections: &[Arc<Selection>],
    mech: Mechanism,
    client: &str,
) -> Option<Arc<Selection>> {
    selections
        .iter()
        .find(|s| s.mechanism() == mech && s.client() == client)
        .cloned()
}

// =============================================================================
// Scenario 1: Windows SMB share with a domain-qualified password login
// =============================================================================

#[tokio::test]
async fn test_windows_smb_with_password() {
    let env = TestEnv::new();
    let hints = ServerHints::new()
        .with_mech(MechOid::Kerberos)
        .with_mech(MechOid::Ntlm);
    let info = ClientInfo::new()
        .with_username("DOMAIN\\alice")
        .with_password("p")
        .with_server_hints(hints);

    let session = Session::create(env.providers(), "fs.corp.example.com", "cifs", Some(info))
        .await
        .unwrap();
    let selections = session.selections();

    let kerberos = find(&selections, Mechanism::Kerberos, "alice@DOMAIN")
        .expect("domain-qualified Kerberos candidate");
    assert_eq!(
        kerberos.server().as_deref(),
        Some("cifs/fs.corp.example.com@DOMAIN")
    );

    let ntlm = find(&selections, Mechanism::Ntlm, "alice@DOMAIN")
        .expect("domain-qualified NTLM candidate");
    assert_eq!(ntlm.server().as_deref(), Some("cifs@fs.corp.example.com"));

    // The host-scoped fallback keeps its literal backslash.
    assert!(
        find(&selections, Mechanism::Ntlm, "alice@\\fs.corp.example.com").is_some(),
        "expected the host-scoped NTLM fallback"
    );

    for selection in &selections {
        assert!(!selection.client().contains("LKDC"));
        assert!(!selection.server().unwrap_or_default().contains("LKDC"));
        assert!(selection.use_spnego());
    }
}

// =============================================================================
// Scenario 2: local AFP server, password, no hints
// =============================================================================

#[tokio::test]
async fn test_local_afp_without_hints() {
    let env = TestEnv::new().with_kerberos(
        MockKerberos::builder()
            .with_lkdc_realm("mac-mini.local", "LKDC:SHA1.0A1B2C3D")
            .build(),
    );
    let info = ClientInfo::new().with_username("bob").with_password("p");

    let session = Session::create(env.providers(), "mac-mini.local", "afpserver", Some(info))
        .await
        .unwrap();
    let selections = session.selections();
    assert_eq!(selections.len(), 1);

    let classic = &selections[0];
    assert_eq!(classic.mechanism(), Mechanism::Kerberos);
    // AFP without an AppleLKDC hint negotiates the mechanism directly.
    assert!(!classic.use_spnego());

    assert!(classic.wait().await, "resolver should complete");
    assert_eq!(classic.client(), "bob@LKDC:SHA1.0A1B2C3D");
    assert_eq!(
        classic.server().as_deref(),
        Some("afpserver/LKDC:SHA1.0A1B2C3D@LKDC:SHA1.0A1B2C3D")
    );
}

// =============================================================================
// Scenario 3: PKU2U hint with a client certificate
// =============================================================================

#[tokio::test]
async fn test_pku2u_hint_with_certificate() {
    let cert = TestCertificate::new(&b"peer certificate"[..]);
    let env = TestEnv::new();
    env.certificates.put_kerberos_principal(&cert, "carol-cert");

    let hints = ServerHints::new().with_mech(MechOid::Pku2u);
    let info = ClientInfo::new()
        .with_username("carol")
        .with_certificate(cert)
        .with_server_hints(hints);

    let session = Session::create(env.providers(), "peer.example", "vnc", Some(info))
        .await
        .unwrap();
    let selections = session.selections();

    let expected_server = format!("vnc/localhost@{WELLKNOWN_LKDC_REALM}");
    let user_entry = find(
        &selections,
        Mechanism::Kerberos,
        &format!("carol@{WELLKNOWN_LKDC_REALM}"),
    )
    .expect("wellknown LKDC user candidate");
    assert_eq!(user_entry.server().as_deref(), Some(expected_server.as_str()));

    let cert_entry = find(
        &selections,
        Mechanism::Kerberos,
        &format!("carol-cert@{WELLKNOWN_LKDC_REALM}"),
    )
    .expect("wellknown LKDC certificate candidate");
    assert_eq!(cert_entry.server().as_deref(), Some(expected_server.as_str()));
    assert!(cert_entry.certificate().is_some());

    // Classic LKDC is disabled: everything resolved at insertion.
    for selection in &selections {
        assert!(selection.server().is_some());
    }
    // And no certificate produced a fingerprint client.
    assert!(selections.iter().all(|s| s.client().len() != 40));
}

// =============================================================================
// Scenario 4: enterprise name with a KDC referral
// =============================================================================

#[tokio::test]
async fn test_enterprise_name_referral() {
    let env = TestEnv::new().with_kerberos(
        MockKerberos::builder()
            .with_canonical("alice@sub@REALM", "alice@REALM")
            .build(),
    );
    let info = ClientInfo::new()
        .with_username("alice@sub@REALM")
        .with_password("p");

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    let selection = find(&session.selections(), Mechanism::Kerberos, "alice@sub@REALM")
        .expect("explicit-domain Kerberos candidate");

    selection
        .acquire_credential(AcquireOptions::new())
        .await
        .unwrap();

    let exchanges = env.kerberos.exchanges();
    assert_eq!(exchanges.len(), 1);
    assert!(
        exchanges[0].enterprise,
        "two @ in the client selects enterprise parsing"
    );

    // The selection adopted the canonicalised principal, and the server
    // was rebuilt to match its realm.
    assert_eq!(selection.client(), "alice@REALM");
    assert_eq!(
        selection.server().as_deref(),
        Some("cifs/fs.example.com@REALM")
    );
    assert!(selection.have_credential());
}

// =============================================================================
// Scenario 5: existing LKDC cache short-circuits acquisition
// =============================================================================

#[tokio::test]
async fn test_existing_lkdc_cache_hit() {
    let principal = KrbPrincipal::new(
        "user@LKDC:SHA1.FEED",
        "LKDC:SHA1.FEED",
        false,
    );
    let cache = MockCredCache::new("API:cache-1", principal);
    cache.put_config(cache_config::LKDC_HOSTNAME, "mac-mini.local");
    cache.put_config(cache_config::FRIENDLY_NAME, "Bob's Mac");

    let env = TestEnv::new().with_kerberos(
        MockKerberos::builder().with_cache(Arc::clone(&cache)).build(),
    );
    let info = ClientInfo::new().with_username("user").with_password("p");

    let session = Session::create(env.providers(), "mac-mini.local", "cifs", Some(info))
        .await
        .unwrap();
    let selection = find(&session.selections(), Mechanism::Kerberos, "user@LKDC:SHA1.FEED")
        .expect("cache-backed candidate");

    assert!(selection.have_credential());
    assert_eq!(selection.label().as_deref(), Some("Bob's Mac"));
    assert_eq!(
        selection.server().as_deref(),
        Some("cifs/LKDC:SHA1.FEED@LKDC:SHA1.FEED")
    );

    selection
        .acquire_credential(AcquireOptions::new())
        .await
        .unwrap();
    assert!(
        env.kerberos.exchanges().is_empty(),
        "cache hit must not contact the KDC"
    );
}

// =============================================================================
// Scenario 6: cancellation during LKDC realm discovery
// =============================================================================

#[tokio::test]
async fn test_cancel_mid_resolve() {
    let gate = Gate::new();
    let env = TestEnv::new().with_kerberos(
        MockKerberos::builder()
            .with_lkdc_realm("mac-mini.local", "LKDC:SHA1.FEED")
            .with_discovery_gate(Arc::clone(&gate))
            .build(),
    );
    let info = ClientInfo::new().with_username("bob").with_password("p");

    let session = Session::create(env.providers(), "mac-mini.local", "afpserver", Some(info))
        .await
        .unwrap();
    let selection = session.selections().remove(0);
    assert!(selection.server().is_none(), "resolution still pending");

    session.cancel();

    let settled = tokio::time::timeout(Duration::from_secs(1), selection.wait())
        .await
        .expect("wait must settle after cancel");
    assert!(!settled, "cancelled selections observe failure");

    let result = selection.acquire_credential(AcquireOptions::new()).await;
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(selection.auth_info().is_none());

    // Unblock the parked resolver so the runtime can shut down.
    gate.open();
}

// =============================================================================
// User-selection overrides
// =============================================================================

#[tokio::test]
async fn test_user_selection_override_comes_first() {
    let env = TestEnv::new().with_preferences(MockPreferences::with_selections(vec![
        UserSelection {
            mech: "NTLM".into(),
            domain: "FS.CORP.Example.Com".into(),
            user: None,
            client: "pinned@CORP".into(),
        },
        UserSelection {
            mech: "NTLM".into(),
            domain: "other.example.com".into(),
            user: None,
            client: "ignored@CORP".into(),
        },
    ]));
    let info = ClientInfo::new()
        .with_username("DOMAIN\\alice")
        .with_password("p");

    let session = Session::create(env.providers(), "fs.corp.example.com", "cifs", Some(info))
        .await
        .unwrap();
    let selections = session.selections();

    // The override bypasses the specific-name filter and leads the list.
    assert_eq!(selections[0].client(), "pinned@CORP");
    assert_eq!(
        selections[0].server().as_deref(),
        Some("cifs@fs.corp.example.com")
    );
    assert!(find(&selections, Mechanism::Ntlm, "ignored@CORP").is_none());
}

#[tokio::test]
async fn test_user_selection_override_respects_user_match() {
    let env = TestEnv::new().with_preferences(MockPreferences::with_selections(vec![
        UserSelection {
            mech: "Kerberos".into(),
            domain: "fs.example.com".into(),
            user: Some("someone-else".into()),
            client: "pinned@CORP".into(),
        },
    ]));
    let info = ClientInfo::new().with_username("alice").with_password("p");

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    assert!(find(&session.selections(), Mechanism::Kerberos, "pinned@CORP").is_none());
}

// =============================================================================
// Hint gating and guesser fallout
// =============================================================================

#[tokio::test]
async fn test_unusable_hints_mean_no_mechanism() {
    let env = TestEnv::new();
    let hints = ServerHints::new().with_mech(MechOid::AppleLkdc);
    let info = ClientInfo::new()
        .with_username("alice")
        .with_password("p")
        .with_server_hints(hints);

    let result = Session::create(env.providers(), "fs.example.com", "cifs", Some(info)).await;
    assert!(matches!(result, Err(Error::NoMechanism)));
}

#[tokio::test]
async fn test_broken_kerberos_context_keeps_ntlm_candidates() {
    let env = TestEnv::new()
        .with_kerberos(MockKerberos::builder().with_broken_context().build());
    let info = ClientInfo::new().with_username("alice").with_password("p");

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    assert!(
        session
            .selections()
            .iter()
            .all(|s| s.mechanism() == Mechanism::Ntlm)
    );
}

#[tokio::test]
async fn test_raw_ntlm_hint_clears_spnego() {
    let env = TestEnv::new();
    let hints = ServerHints::new()
        .with_mech(MechOid::Kerberos)
        .with_mech_value(MechOid::Ntlm, &b"raw"[..]);
    let info = ClientInfo::new()
        .with_username("alice")
        .with_password("p")
        .with_server_hints(hints);

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    for selection in session.selections() {
        if selection.mechanism() == Mechanism::Ntlm {
            assert!(!selection.use_spnego());
        }
    }
}

// =============================================================================
// IAKERB
// =============================================================================

#[tokio::test]
async fn test_iakerb_acquisition_adopts_credential_uuid() {
    let env = TestEnv::new();
    let hints = ServerHints::new()
        .with_mech(MechOid::Iakerb)
        .with_mech(MechOid::AppleLkdc);
    let info = ClientInfo::new()
        .with_username("dave")
        .with_password("p")
        .with_server_hints(hints);

    let session = Session::create(env.providers(), "peer.example", "vnc", Some(info))
        .await
        .unwrap();
    let selection = find(
        &session.selections(),
        Mechanism::KerberosIakerb,
        &format!("dave@{WELLKNOWN_LKDC_REALM}"),
    )
    .expect("IAKERB wellknown candidate");

    selection
        .acquire_credential(AcquireOptions::new())
        .await
        .unwrap();

    let client = selection.client();
    assert_ne!(client, format!("dave@{WELLKNOWN_LKDC_REALM}"));
    let auth = selection.auth_info().expect("resolved selection");
    assert_eq!(auth.client_name_type, GssdClientType::User);
    assert_eq!(auth.client, client);
}

#[tokio::test]
async fn test_gss_flag_disabled_falls_back_to_wellknown_kerberos() {
    let env = TestEnv::new().with_preferences(MockPreferences::gss_disabled());
    let hints = ServerHints::new()
        .with_mech(MechOid::Iakerb)
        .with_mech(MechOid::AppleLkdc);
    let info = ClientInfo::new()
        .with_username("dave")
        .with_password("p")
        .with_server_hints(hints);

    let session = Session::create(env.providers(), "peer.example", "vnc", Some(info))
        .await
        .unwrap();
    let selections = session.selections();
    assert!(
        find(
            &selections,
            Mechanism::Kerberos,
            &format!("dave@{WELLKNOWN_LKDC_REALM}")
        )
        .is_some()
    );
    assert!(
        selections
            .iter()
            .all(|s| s.mechanism() != Mechanism::KerberosIakerb)
    );
}

// =============================================================================
// Acquisition edge cases
// =============================================================================

#[tokio::test]
async fn test_acquisition_without_material_is_a_structured_failure() {
    let env = TestEnv::new().with_kerberos(
        MockKerberos::builder()
            .with_host_realm("fs.example.com", "EXAMPLE.COM")
            .build(),
    );
    // No password, no certificates: candidates exist but cannot acquire.
    let hints = ServerHints::new().with_mech(MechOid::Kerberos);
    let info = ClientInfo::new()
        .with_username("alice")
        .with_server_hints(hints);

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    let selection = find(&session.selections(), Mechanism::Kerberos, "alice@EXAMPLE.COM")
        .expect("host-realm candidate");
    let result = selection.acquire_credential(AcquireOptions::new()).await;
    assert!(matches!(result, Err(Error::MissingCredentials)));
}

#[tokio::test]
async fn test_acquire_password_override() {
    let env = TestEnv::new().with_kerberos(
        MockKerberos::builder()
            .with_host_realm("fs.example.com", "EXAMPLE.COM")
            .build(),
    );
    let hints = ServerHints::new().with_mech(MechOid::Kerberos);
    let info = ClientInfo::new()
        .with_username("alice")
        .with_server_hints(hints);

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    let selection = find(&session.selections(), Mechanism::Kerberos, "alice@EXAMPLE.COM")
        .expect("host-realm candidate");
    selection
        .acquire_credential(AcquireOptions::new().with_password("late"))
        .await
        .unwrap();
    assert!(selection.have_credential());
    assert_eq!(env.kerberos.exchanges().len(), 1);
}

#[tokio::test]
async fn test_ntlm_acquisition_labels_the_credential() {
    let env = TestEnv::new();
    let info = ClientInfo::new()
        .with_username("DOMAIN\\alice")
        .with_password("p");

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    let selection = find(&session.selections(), Mechanism::Ntlm, "alice@DOMAIN")
        .expect("NTLM candidate");
    selection
        .acquire_credential(AcquireOptions::new())
        .await
        .unwrap();

    let cred = env.ntlm.find("alice@DOMAIN").expect("acquired credential");
    assert_eq!(
        cred.label(cache_config::FRIENDLY_NAME).as_deref(),
        Some("alice@DOMAIN")
    );
    assert_eq!(cred.label(cache_config::NAH_CREATED).as_deref(), Some("1"));
}

#[tokio::test]
async fn test_held_ntlm_credentials_become_candidates() {
    let env = TestEnv::new().with_ntlm(
        MockNtlm::builder()
            .with_held_credential("alice@CORP", Mechanism::Ntlm, true)
            .build(),
    );
    let info = ClientInfo::new().with_username("alice");

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    let selection = find(&session.selections(), Mechanism::Ntlm, "alice@CORP")
        .expect("held-credential candidate");
    assert!(selection.have_credential());
    selection
        .acquire_credential(AcquireOptions::new())
        .await
        .unwrap();
}

// =============================================================================
// Reference counting and labelling
// =============================================================================

#[tokio::test]
async fn test_reference_counting_lifecycle() {
    let env = TestEnv::new();
    let info = ClientInfo::new()
        .with_username("DOMAIN\\alice")
        .with_password("p");

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    let selection = find(&session.selections(), Mechanism::Ntlm, "alice@DOMAIN")
        .expect("NTLM candidate");
    selection
        .acquire_credential(AcquireOptions::new())
        .await
        .unwrap();

    let key = selection.reference_key();
    assert_eq!(key, "ntlm:alice@DOMAIN");

    assert!(session.add_reference_and_label(&selection, "smb-mount"));
    let cred = env.ntlm.find("alice@DOMAIN").expect("credential");
    assert_eq!(cred.hold_count(), 1);
    assert_eq!(cred.label("smb-mount").as_deref(), Some("1"));

    assert!(session.cred_add_reference(&key));
    assert_eq!(cred.hold_count(), 2);
    assert!(session.cred_remove_reference(&key));
    assert_eq!(cred.hold_count(), 1);

    session.find_by_label_and_release("smb-mount").await;
    assert_eq!(cred.hold_count(), 0);
    assert!(cred.label("smb-mount").is_none());
}

#[tokio::test]
async fn test_cred_change_refuses_foreign_credentials() {
    let env = TestEnv::new().with_ntlm(
        MockNtlm::builder()
            .with_held_credential("foreign@CORP", Mechanism::Ntlm, false)
            .build(),
    );
    let info = ClientInfo::new().with_username("alice").with_password("p");

    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    assert!(!session.cred_add_reference("ntlm:foreign@CORP"));
    let cred = env.ntlm.find("foreign@CORP").expect("credential");
    assert_eq!(cred.hold_count(), 0);
}

#[tokio::test]
async fn test_find_by_label_skips_foreign_credentials() {
    let env = TestEnv::new().with_ntlm(
        MockNtlm::builder()
            .with_held_credential("foreign@CORP", Mechanism::Ntlm, false)
            .build(),
    );
    let foreign = env.ntlm.find("foreign@CORP").expect("credential");
    foreign.put_label("mount", "1");
    let _ = foreign.hold();

    let info = ClientInfo::new().with_username("alice").with_password("p");
    let session = Session::create(env.providers(), "fs.example.com", "cifs", Some(info))
        .await
        .unwrap();
    session.find_by_label_and_release("mount").await;

    // Untouched: it was not created here.
    assert_eq!(foreign.hold_count(), 1);
    assert_eq!(foreign.label("mount").as_deref(), Some("1"));
}

// =============================================================================
// Output projection
// =============================================================================

#[tokio::test]
async fn test_info_keys_and_auth_info() {
    let env = TestEnv::new();
    let hints = ServerHints::new()
        .with_mech(MechOid::Kerberos)
        .with_mech(MechOid::Ntlm);
    let info = ClientInfo::new()
        .with_username("DOMAIN\\alice")
        .with_password("p")
        .with_server_hints(hints);

    let session = Session::create(env.providers(), "fs.corp.example.com", "cifs", Some(info))
        .await
        .unwrap();
    let selection = find(&session.selections(), Mechanism::Ntlm, "alice@DOMAIN")
        .expect("NTLM candidate");
    assert!(selection.wait().await);

    assert_eq!(
        selection.info(InfoKey::Mechanism).unwrap().as_text(),
        Some("SPNEGO")
    );
    assert_eq!(
        selection.info(InfoKey::InnerMechanism).unwrap().as_text(),
        Some("NTLM")
    );
    assert_eq!(
        selection.info(InfoKey::UseSpnego).unwrap().as_flag(),
        Some(true)
    );
    assert_eq!(
        selection.info(InfoKey::PrintableClient).unwrap().as_text(),
        Some("alice@DOMAIN")
    );

    let auth = selection.auth_info().expect("resolved selection");
    assert_eq!(auth.client_name_type, GssdClientType::NtlmPrincipal);
    assert_eq!(auth.server, "cifs@fs.corp.example.com");
    assert_eq!(auth.mechanism, "SPNEGO");
    assert_eq!(auth.inner_mechanism, "NTLM");
}
