use home_connect::{
    HomeConnectClient, Normalizer, SettingValue, SyncEngine, TokenPair, ValueProfile,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DISHWASHER: &str = "SIEMENS-SN658X06TE-68A40E2C2B1A";
const FRIDGE: &str = "BOSCH-KGN36HI32-6C1A4B9C0B02";

fn client(server: &MockServer) -> HomeConnectClient {
    HomeConnectClient::builder()
        .base_url(server.uri())
        .tokens(TokenPair::new("access", "refresh"))
        .build()
        .unwrap()
}

async fn mount_json(server: &MockServer, resource: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/{resource}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer) {
    mount_json(
        server,
        "homeappliances",
        json!({"data": {"homeappliances": [
            {"haId": DISHWASHER, "name": "Dishwasher", "brand": "Siemens", "type": "Dishwasher", "connected": true},
            {"haId": FRIDGE, "name": "Fridge", "brand": "Bosch", "type": "FridgeFreezer", "connected": true}
        ]}}),
    )
    .await;
}

async fn mount_dishwasher(server: &MockServer) {
    mount_json(
        server,
        &format!("homeappliances/{DISHWASHER}/settings"),
        json!({"data": {"settings": [
            {"key": "BSH.Common.Setting.PowerState", "value": "BSH.Common.EnumType.PowerState.On"},
            {"key": "BSH.Common.Setting.ChildLock", "value": false}
        ]}}),
    )
    .await;
    mount_json(
        server,
        &format!("homeappliances/{DISHWASHER}/status"),
        json!({"data": {"status": [
            {"key": "BSH.Common.Status.OperationState", "value": "BSH.Common.EnumType.OperationState.Ready"},
            {"key": "BSH.Common.Status.RemoteControlStartAllowed", "value": true}
        ]}}),
    )
    .await;
    mount_json(
        server,
        &format!("homeappliances/{DISHWASHER}/programs/available"),
        json!({"data": {"programs": [
            {"key": "Dishcare.Dishwasher.Program.Eco50"},
            {"key": "Dishcare.Dishwasher.Program.Auto2"},
            {"key": "Dishcare.Dishwasher.Program.Quick45"}
        ]}}),
    )
    .await;
    mount_json(
        server,
        &format!("homeappliances/{DISHWASHER}/programs/selected"),
        json!({"data": {"key": "Dishcare.Dishwasher.Program.Auto2", "options": []}}),
    )
    .await;
}

async fn mount_fridge(server: &MockServer) {
    mount_json(
        server,
        &format!("homeappliances/{FRIDGE}/settings"),
        json!({"data": {"settings": [
            {"key": "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureFreezer", "value": -20, "unit": "°C"}
        ]}}),
    )
    .await;
    mount_json(
        server,
        &format!("homeappliances/{FRIDGE}/status"),
        json!({"data": {"status": []}}),
    )
    .await;
}

#[tokio::test]
async fn discovery_assembles_settings_status_and_programs() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    mount_dishwasher(&server).await;
    mount_fridge(&server).await;

    let mut client = client(&server);
    let normalizer = Normalizer::default();
    let appliances = SyncEngine::new(&mut client, &normalizer)
        .discover_devices()
        .await;
    assert_eq!(appliances.len(), 2);

    let dishwasher = &appliances[0];
    assert_eq!(dishwasher.id, DISHWASHER);
    assert_eq!(dishwasher.brand, "Siemens");
    assert!(dishwasher.connected);

    let keys: Vec<&str> = dishwasher.settings.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(
        keys,
        [
            "Power State",
            "Start Device",
            "Brilliance Dry",
            "VarioSpeed Plus",
            "Intensive Zone",
            "Child Lock",
            "Operation State",
            "Remote control start allowance",
            "Program",
        ]
    );
    assert_eq!(
        dishwasher.setting("Power State").unwrap().value,
        Some(SettingValue::Bool(true))
    );
    assert_eq!(
        dishwasher.setting("Start Device").unwrap().value,
        Some(SettingValue::Bool(false))
    );

    let state = dishwasher.setting("Operation State").unwrap();
    assert_eq!(state.value, Some(SettingValue::Int(1)));
    assert!(matches!(state.profile, Some(ValueProfile::Selectable(ref p)) if p.len() == 9));

    let program = dishwasher.setting("Program").unwrap();
    assert_eq!(program.value, Some(SettingValue::Int(1)));
    let Some(ValueProfile::Selectable(ref profile)) = program.profile else {
        panic!("program profile missing");
    };
    assert_eq!(profile.label(1), Some("Auto 2"));
    assert_eq!(dishwasher.programs.len(), 3);
}

#[tokio::test]
async fn fridge_freezer_gets_defaults_and_no_program_list() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    mount_dishwasher(&server).await;
    mount_fridge(&server).await;
    Mock::given(method("GET"))
        .and(path(format!("/api/homeappliances/{FRIDGE}/programs/available")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"programs": []}})))
        .expect(0)
        .mount(&server)
        .await;

    let mut client = client(&server);
    let normalizer = Normalizer::default();
    let appliances = SyncEngine::new(&mut client, &normalizer)
        .discover_devices()
        .await;

    let fridge = &appliances[1];
    assert_eq!(fridge.appliance_type, "FridgeFreezer");
    assert!(fridge.setting("Program").is_none());
    assert!(fridge.programs.is_empty());

    assert_eq!(
        fridge.setting("Target Temperature Freezer").unwrap().value,
        Some(SettingValue::Int(-20))
    );
    assert_eq!(
        fridge.setting("Target Temperature Refrigerator").unwrap().value,
        Some(SettingValue::Int(4))
    );
    assert_eq!(
        fridge.setting("Super Mode Freezer").unwrap().value,
        Some(SettingValue::Bool(false))
    );
}

#[tokio::test]
async fn missing_selection_yields_minus_one() {
    let server = MockServer::start().await;
    mount_json(
        &server,
        "homeappliances",
        json!({"data": {"homeappliances": [
            {"haId": DISHWASHER, "type": "Dishwasher", "connected": true}
        ]}}),
    )
    .await;
    mount_json(
        &server,
        &format!("homeappliances/{DISHWASHER}/programs/available"),
        json!({"data": {"programs": [{"key": "Dishcare.Dishwasher.Program.Eco50"}]}}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/homeappliances/{DISHWASHER}/programs/selected")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"key": "SDK.Error.NoProgramSelected", "description": "No program selected"}
        })))
        .mount(&server)
        .await;

    let mut client = client(&server);
    let normalizer = Normalizer::default();
    let appliances = SyncEngine::new(&mut client, &normalizer)
        .discover_devices()
        .await;

    let dishwasher = &appliances[0];
    // Settings and status were unavailable; defaults still apply.
    assert_eq!(
        dishwasher.setting("Power State").unwrap().value,
        Some(SettingValue::Bool(false))
    );
    assert_eq!(
        dishwasher.setting("Program").unwrap().value,
        Some(SettingValue::Int(-1))
    );
}

#[tokio::test]
async fn failed_listing_finds_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/homeappliances"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut client = client(&server);
    let normalizer = Normalizer::default();
    let appliances = SyncEngine::new(&mut client, &normalizer)
        .discover_devices()
        .await;
    assert!(appliances.is_empty());
}
