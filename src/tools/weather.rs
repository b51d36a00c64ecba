//! Current conditions from Open-Meteo.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::ToolError;
use crate::tool::{ParamKind, ParamSpec, Tool, ToolName, ToolSchema};
use crate::tools::http::{require, UpstreamClient};

const CURRENT_FIELDS: &str = "temperature_2m,weather_code,wind_speed_10m";

pub struct WeatherTool {
    client: UpstreamClient,
}

impl WeatherTool {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

fn coordinate(
    arguments: &Map<String, Value>,
    field: &str,
    limit: f64,
) -> Result<f64, ToolError> {
    let value = arguments
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::invalid("get_weather", format!("`{field}` must be a number")))?;
    if !value.is_finite() || value.abs() > limit {
        return Err(ToolError::invalid(
            "get_weather",
            format!("`{field}` must be within [-{limit}, {limit}], got {value}"),
        ));
    }
    Ok(value)
}

#[async_trait]
impl Tool for WeatherTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            ToolName::GetWeather,
            "Get current weather at coordinates via Open-Meteo API. Returns temperature, weather code, and wind speed.",
            vec![
                ParamSpec::required("latitude", ParamKind::Number, "Latitude coordinate (-90 to 90)"),
                ParamSpec::required(
                    "longitude",
                    ParamKind::Number,
                    "Longitude coordinate (-180 to 180)",
                ),
            ],
        )
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let latitude = coordinate(&arguments, "latitude", 90.0)?;
        let longitude = coordinate(&arguments, "longitude", 180.0)?;

        let url = self
            .client
            .url(&self.client.config().weather_url, "/v1/forecast");
        let body = self
            .client
            .get_json(
                ToolName::GetWeather,
                &url,
                &[
                    ("latitude", latitude.to_string()),
                    ("longitude", longitude.to_string()),
                    ("current", CURRENT_FIELDS.to_string()),
                    ("timezone", "auto".to_string()),
                ],
            )
            .await?;

        let temperature = require(ToolName::GetWeather, &body, "/current/temperature_2m")?
            .as_f64()
            .ok_or_else(|| ToolError::upstream("get_weather", "temperature is not a number"))?;
        let units = &body["current_units"];

        Ok(json!({
            "latitude": latitude,
            "longitude": longitude,
            "time": body["current"]["time"],
            "temperature": temperature,
            "temperature_unit": units["temperature_2m"].as_str().unwrap_or("°C"),
            "weather_code": body["current"]["weather_code"],
            "wind_speed": body["current"]["wind_speed_10m"],
            "wind_speed_unit": units["wind_speed_10m"].as_str().unwrap_or("km/h"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_coordinates() {
        let args = json!({"latitude": 91.0, "longitude": 0.0});
        let err = coordinate(args.as_object().unwrap(), "latitude", 90.0).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { .. }));

        let args = json!({"latitude": 0.0, "longitude": -180.0});
        assert_eq!(coordinate(args.as_object().unwrap(), "longitude", 180.0), Ok(-180.0));
    }
}
