use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose};
use chrono::Local;
use fogifier::{
    Annotation, FogError, Fogifier, ImageSource, Severity,
    aqi::{SensorClient, http_client},
    config::Config,
    fog::FogLibrary,
    geocode::Geocoder,
    raster,
    text::Typeface,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const JPEG_QUALITY: u8 = 90;
const TIMESTAMP_FORMAT: &str = "%d/%m %H:%M";

#[derive(Clone)]
struct AppState {
    fogifier: Arc<Fogifier>,
    sensors: SensorClient,
    geocoder: Geocoder,
}

#[derive(Debug, Serialize)]
struct FogifyResponse {
    /// Base64 JPEGs: processed first, then original.
    result: Vec<String>,
    aqi: u32,
    severity: Severity,
    location: String,
}

struct Upload {
    file: Vec<u8>,
    lat: f64,
    lon: f64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fogifier=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("invalid configuration");

    let typeface = Typeface::load(&config.font_path).expect("cannot load typeface");
    info!("Loaded typeface {:?} from {}", typeface.family(), config.font_path.display());

    let fogs = FogLibrary::new(&config.fog_dir);
    match fogs.textures() {
        Ok(textures) if !textures.is_empty() => {
            info!("{} fog textures in {}", textures.len(), fogs.dir().display())
        }
        Ok(_) => warn!("No fog textures in {}, processed renders will fail", fogs.dir().display()),
        Err(e) => warn!("Cannot list fog textures: {}", e),
    }

    let http = http_client(config.upstream_timeout).expect("cannot build HTTP client");
    let state = AppState {
        fogifier: Arc::new(Fogifier::new(typeface, fogs)),
        sensors: SensorClient::new(http.clone(), config.sensor_api_url.clone(), config.sensor_radius_km),
        geocoder: Geocoder::new(http, config.geocoder_url.clone(), config.geocoder_api_key.clone()),
    };

    let app = Router::new()
        .route("/", get(index))
        .route("/fogify", post(fogify))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn index() -> Html<&'static str> {
    Html(
        "<h1>Fogifier</h1>\
         <form action='/fogify' method='post' enctype='multipart/form-data'>\
         <input type='file' name='file' accept='image/*'>\
         <input name='lat' placeholder='latitude'>\
         <input name='lon' placeholder='longitude'>\
         <button>Fogify</button></form>",
    )
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, String> {
    let (mut file, mut lat, mut lon) = (None, None, None);
    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => file = Some(field.bytes().await.map_err(|e| e.to_string())?.to_vec()),
            "lat" | "lon" => {
                let text = field.text().await.map_err(|e| e.to_string())?;
                let value: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| format!("{} is not a number: {:?}", name, text))?;
                if name == "lat" {
                    lat = Some(value);
                } else {
                    lon = Some(value);
                }
            }
            _ => {}
        }
    }

    Ok(Upload {
        file: file.ok_or("missing file")?,
        lat: lat.ok_or("missing lat")?,
        lon: lon.ok_or("missing lon")?,
    })
}

fn encode_base64_jpeg(image: &image::RgbImage) -> Result<String, FogError> {
    Ok(general_purpose::STANDARD.encode(raster::encode_jpeg(image, JPEG_QUALITY)?))
}

async fn fogify(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            warn!("Rejected upload: {}", e);
            return (StatusCode::BAD_REQUEST, e).into_response();
        }
    };
    let (lat, lon) = (upload.lat, upload.lon);

    let start = Instant::now();
    let aqi = match state.sensors.lookup_aqi(lat, lon).await {
        Ok(Some(aqi)) => aqi,
        Ok(None) => {
            info!("No sensor data near {}, {} (took {:?})", lat, lon, start.elapsed());
            return (StatusCode::IM_A_TEAPOT, "I'm a teapot").into_response();
        }
        Err(e) => {
            error!("Error fetching sensors: {} (took {:?})", e, start.elapsed());
            return (StatusCode::BAD_GATEWAY, format!("Error: {}", e)).into_response();
        }
    };

    let location = match state.geocoder.label(lat, lon).await {
        Ok(location) => location,
        Err(e) => {
            error!("Error reverse geocoding: {} (took {:?})", e, start.elapsed());
            return (StatusCode::BAD_GATEWAY, format!("Error: {}", e)).into_response();
        }
    };
    let fetch_duration = start.elapsed();

    let render_start = Instant::now();
    let fogifier = state.fogifier.clone();
    let annotation = Annotation {
        location: location.clone(),
        timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        aqi,
    };
    let rendered = tokio::task::spawn_blocking(move || -> Result<Vec<String>, FogError> {
        let pair = fogifier.render_both(
            ImageSource::Bytes(&upload.file),
            &annotation,
            &mut rand::thread_rng(),
        )?;
        Ok(vec![
            encode_base64_jpeg(&pair.processed)?,
            encode_base64_jpeg(&pair.original)?,
        ])
    })
    .await;

    match rendered {
        Ok(Ok(result)) => {
            info!(
                "Request processed: aqi={}, fetch={:?}, render={:?}",
                aqi,
                fetch_duration,
                render_start.elapsed()
            );
            Json(FogifyResponse {
                result,
                aqi,
                severity: Severity::classify(aqi),
                location,
            })
            .into_response()
        }
        Ok(Err(e)) => {
            error!("Error rendering image: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
        Err(e) => {
            error!("Render task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
