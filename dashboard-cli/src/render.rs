use dashboard_core::{FetchStatus, Snapshot, StockSeries, WeatherObservation};

/// Loading / error / empty lines shared by both datasets. Returns `true` when
/// there is data left for the caller to draw.
fn status_line<T>(snap: &Snapshot<T>, loading: &str) -> bool {
    match snap.status {
        FetchStatus::Idle => {
            println!("(no query yet)");
            false
        }
        FetchStatus::Loading => {
            println!("{loading}");
            false
        }
        FetchStatus::Failed => {
            println!("Error: {}", snap.error.as_deref().unwrap_or("unknown error"));
            false
        }
        FetchStatus::Succeeded => snap.data.is_some(),
    }
}

pub fn weather(snap: &Snapshot<Vec<WeatherObservation>>, icon_base_url: &str) {
    if !status_line(snap, "Loading...") {
        return;
    }
    let Some(data) = &snap.data else { return };

    println!("Weather for {}", data.parameter);
    if data.value.is_empty() {
        println!("(no observations)");
        return;
    }

    println!("{:<6} {:<14} {:<28} Icon", "Id", "Main", "Description");
    for row in &data.value {
        println!(
            "{:<6} {:<14} {:<28} {}",
            row.id,
            row.main,
            row.description,
            row.icon_url(icon_base_url)
        );
    }
}

pub fn stock(snap: &Snapshot<StockSeries>) {
    if !status_line(snap, "Loading stock data...") {
        return;
    }
    let Some(data) = &snap.data else { return };
    let meta = &data.value.metadata;

    println!("Stock Prices for {}", meta.symbol().unwrap_or(&data.parameter));
    println!("Information:    {}", meta.information().unwrap_or("-"));
    println!("Last Refreshed: {}", meta.last_refreshed().unwrap_or("-"));
    println!("Time Zone:      {}", meta.time_zone().unwrap_or("-"));

    if data.value.points.is_empty() {
        println!("(no price points)");
        return;
    }

    println!();
    println!("{:<12} {:>12}", "Date", "Close");
    for point in &data.value.points {
        println!("{:<12} {:>12}", point.date.format("%Y-%m-%d"), point.close_price);
    }
}
