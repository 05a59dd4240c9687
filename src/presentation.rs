// Console tables for offers

use crate::flights::FlightOffer;
use crate::hotels::{HotelOffer, NOT_AVAILABLE};

pub const LINK_DISPLAY_CHARS: usize = 20;

/// Shortens a URL for display: first `max_chars` characters plus "...".
pub fn truncate_link(link: &str, max_chars: usize) -> String {
    if link.chars().count() > max_chars {
        let head: String = link.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        link.to_string()
    }
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let pad = width - cell.chars().count();
                format!("{}{}", " ".repeat(pad), cell)
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut out = vec![line(headers.iter().map(|h| h.to_string()).collect())];
    out.extend(rows.iter().map(|row| line(row.clone())));
    out.join("\n")
}

pub fn flight_table(offers: &[FlightOffer]) -> String {
    let headers = [
        "Price",
        "Airline",
        "Flight Number",
        "Departure",
        "Arrival",
        "Duration (min)",
        "Stops",
        "Return Flight",
    ];
    let rows: Vec<Vec<String>> = offers
        .iter()
        .map(|o| {
            vec![
                o.price.clone(),
                o.airline.clone(),
                o.flight_number.clone(),
                format!("{} at {}", o.departure.code, o.departure.timestamp),
                format!("{} at {}", o.arrival.code, o.arrival.timestamp),
                o.duration_minutes.to_string(),
                o.stop_count.to_string(),
                o.return_leg_summary.clone(),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

pub fn hotel_table(offers: &[HotelOffer]) -> String {
    let headers = ["Name", "Price", "Rating", "Location", "Link"];
    let rows: Vec<Vec<String>> = offers
        .iter()
        .map(|o| {
            vec![
                o.name.clone(),
                o.price.clone(),
                o.rating_label(),
                o.location.clone(),
                o.link
                    .as_deref()
                    .map(|l| truncate_link(l, LINK_DISPLAY_CHARS))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ]
        })
        .collect();
    render_table(&headers, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flights::LegEndpoint;

    #[test]
    fn test_truncate_link() {
        assert_eq!(
            truncate_link("https://www.tripadvisor.com/Hotel_Review", 20),
            "https://www.tripadvi..."
        );
        assert_eq!(truncate_link("https://x.io", 20), "https://x.io");
    }

    #[test]
    fn test_hotel_table_truncates_only_for_display() {
        let offer = HotelOffer {
            name: "Hotel Eden".to_string(),
            price: "€410".to_string(),
            rating: Some(4.8),
            location: "Ludovisi".to_string(),
            link: Some("https://www.booking.com/hotel/it/eden.html".to_string()),
        };
        let table = hotel_table(std::slice::from_ref(&offer));

        assert!(table.contains("https://www.booking..."));
        assert!(!table.contains("eden.html"));
        assert_eq!(offer.link.as_deref(), Some("https://www.booking.com/hotel/it/eden.html"));
    }

    #[test]
    fn test_flight_table_columns_align() {
        let offer = FlightOffer {
            price: "€89".to_string(),
            airline: "ITA Airways".to_string(),
            flight_number: "AZ317".to_string(),
            departure: LegEndpoint {
                code: "CDG".to_string(),
                timestamp: "2025-06-01T07:15:00".to_string(),
            },
            arrival: LegEndpoint {
                code: "FCO".to_string(),
                timestamp: "2025-06-01T09:20:00".to_string(),
            },
            duration_minutes: 125,
            stop_count: 0,
            return_leg_summary: "one-way".to_string(),
        };
        let table = flight_table(&[offer]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chars().count(), lines[1].chars().count());
        assert!(lines[1].contains("CDG at 2025-06-01T07:15:00"));
    }
}
