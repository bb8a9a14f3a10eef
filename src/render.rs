//! Display snippets returned to the chat UI.
//!
//! Every value that came from Duffel or from the model is escaped before it
//! is embedded in markup.

use crate::flights::{FlightSearch, FlightSummary, OfferDetails, OrderConfirmation};

const FONT_STACK: &str =
    "-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif";
const DIRECT_COLOR: &str = "#10b981";
const STOPS_COLOR: &str = "#f59e0b";

pub const GREETING: &str =
    "Hello! I'm your flight booking assistant. Where would you like to fly today?";

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn stops_label(stops: usize) -> String {
    match stops {
        0 => "Direct".to_string(),
        1 => "1 Stop".to_string(),
        n => format!("{} Stops", n),
    }
}

/// Link that posts the canned "Book Flight" message back into the chat
pub fn booking_url(
    send_url: &str,
    index: usize,
    flight: &FlightSummary,
    origin: &str,
    destination: &str,
) -> String {
    let message = format!(
        "Book Flight {} (ID: {}): {} from {} to {} at {} {}",
        index,
        flight.offer_id,
        flight.airline,
        origin,
        destination,
        flight.total_amount,
        flight.total_currency
    );
    format!("{}{}", send_url, urlencoding::encode(&message))
}

pub fn flight_cards(search: &FlightSearch, send_url: &str) -> String {
    let origin = escape_html(&search.origin);
    let destination = escape_html(&search.destination);

    let mut html = String::new();
    html.push_str(
        "<style>@keyframes slideUpFade{from{opacity:0;transform:translateY(20px)}to{opacity:1;transform:translateY(0)}} \
         .flight-container{width:100%;} @media (min-width:768px){.flight-container{min-width:600px;}}</style>",
    );
    html.push_str(&format!(
        "<div class=\"flight-container\" style=\"min-height:600px;box-sizing:border-box;font-family:{};\">",
        FONT_STACK
    ));
    html.push_str(&format!(
        "<div style=\"margin-bottom:24px;text-align:center;animation:slideUpFade 0.5s ease-out forwards;\">\
         <h2 style=\"margin:0;font-size:24px;font-weight:700;color:#111827;\">✈️ Flights to {}</h2>\
         <p style=\"margin:8px 0 0 0;color:#6b7280;font-size:14px;\">Found {} options from {}</p></div>",
        destination,
        search.flights.len(),
        origin
    ));

    for (index, flight) in search.flights.iter().enumerate() {
        flight_card(&mut html, index + 1, flight, search, send_url);
    }

    html.push_str(
        "<div style=\"text-align:center;margin-top:32px;padding-top:24px;border-top:1px solid #e5e7eb;\">\
         <p style=\"color:#9ca3af;font-size:12px;margin:0;\">Prices include all taxes and fees • 24/7 Support</p></div></div>",
    );
    html
}

fn flight_card(
    html: &mut String,
    index: usize,
    flight: &FlightSummary,
    search: &FlightSearch,
    send_url: &str,
) {
    let stops_color = if flight.stops == 0 {
        DIRECT_COLOR
    } else {
        STOPS_COLOR
    };
    // Cards slide in one after another
    let delay = (index - 1) as f64 * 0.15;
    let url = booking_url(send_url, index, flight, &search.origin, &search.destination);
    let (amount, currency) = flight
        .price
        .split_once(' ')
        .unwrap_or((flight.price.as_str(), ""));

    html.push_str(&format!(
        "<div style=\"background:#ffffff;border-radius:16px;box-shadow:0 4px 20px rgba(0,0,0,0.08);margin-bottom:24px;\
         overflow:hidden;width:100%;border:1px solid #f3f4f6;opacity:0;animation:slideUpFade 0.5s ease-out {:.2}s forwards;\">",
        delay
    ));

    html.push_str(&format!(
        "<div style=\"padding:20px 24px;border-bottom:1px solid #f3f4f6;display:flex;justify-content:space-between;align-items:center;\">\
         <div><h3 style=\"margin:0;font-size:16px;font-weight:700;color:#111827;\">{}</h3>\
         <div style=\"font-size:12px;color:#6b7280;margin-top:2px;\">Flight {}</div></div>\
         <div style=\"text-align:right;font-size:20px;font-weight:800;color:#111827;\">{} \
         <span style=\"font-size:14px;font-weight:500;color:#6b7280;\">{}</span></div></div>",
        escape_html(&flight.airline),
        index,
        escape_html(amount),
        escape_html(currency)
    ));

    html.push_str(&format!(
        "<div style=\"padding:24px;display:flex;align-items:center;justify-content:space-between;gap:16px;\">\
         <div style=\"text-align:left;flex:1;\"><div style=\"font-size:24px;font-weight:700;color:#111827;\">{}</div>\
         <div style=\"font-size:14px;font-weight:600;color:#9ca3af;margin-top:4px;\">{}</div></div>\
         <div style=\"flex:2;display:flex;flex-direction:column;align-items:center;\">\
         <div style=\"font-size:12px;font-weight:600;color:#6b7280;margin-bottom:8px;\">{}</div>\
         <div style=\"background:{};padding:0 8px;font-size:10px;font-weight:700;color:white;border-radius:10px;line-height:16px;\">{}</div></div>\
         <div style=\"text-align:right;flex:1;\"><div style=\"font-size:24px;font-weight:700;color:#111827;\">{}</div>\
         <div style=\"font-size:14px;font-weight:600;color:#9ca3af;margin-top:4px;\">{}</div></div></div>",
        escape_html(&flight.departure),
        escape_html(&search.origin),
        escape_html(&flight.duration),
        stops_color,
        stops_label(flight.stops),
        escape_html(&flight.arrival),
        escape_html(&search.destination)
    ));

    html.push_str(&format!(
        "<div style=\"padding:16px 24px;background:#f9fafb;border-top:1px solid #f3f4f6;display:flex;align-items:center;justify-content:space-between;\">\
         <div style=\"display:flex;gap:16px;font-size:12px;font-weight:500;color:#6b7280;\"><span>🧳 Included</span><span>💺 Economy</span></div>\
         <a href=\"{}\" style=\"background:#111827;color:white;text-decoration:none;padding:12px 28px;border-radius:8px;font-weight:600;font-size:14px;\">Select Flight →</a></div></div>",
        escape_html(&url)
    ));
}

pub fn error_block(message: &str) -> String {
    format!(
        "<div style='padding: 20px; color: red; background: #fee; border-radius: 8px; font-family: sans-serif;'>{}</div>",
        escape_html(message)
    )
}

/// Passenger IDs formatted as a bracketed, quoted list
fn id_list(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("'{}'", escape_html(id)))
        .collect();
    format!("[{}]", quoted.join(", "))
}

pub fn offer_retrieved(offer: &OfferDetails) -> String {
    format!(
        "✅ Offer retrieved successfully. Current price: {} {}.\n\n\
         IMPORTANT for Agent: You MUST use these Passenger IDs for the booking: {}\n\n\
         Please collect passenger details (Name, DOB, Gender, Email, Phone + Country Code).",
        escape_html(offer.total_amount.as_deref().unwrap_or("unknown")),
        escape_html(offer.total_currency.as_deref().unwrap_or("")),
        id_list(&offer.passenger_ids)
    )
}

pub fn offer_expired_notice(message: &str) -> String {
    format!(
        "⚠️ {} You can still proceed with booking using the original offer price.",
        escape_html(message)
    )
}

pub fn booking_confirmed(order: &OrderConfirmation) -> String {
    format!(
        "<div style='padding: 24px; background: linear-gradient(135deg, #10b981 0%, #059669 100%); border-radius: 12px; color: white; font-family: sans-serif;'>\
         <h2 style='margin: 0 0 16px 0; font-size: 24px;'>🎉 Booking Confirmed!</h2>\
         <p style='margin: 8px 0; font-size: 16px;'><strong>Booking Reference:</strong> {}</p>\
         <p style='margin: 8px 0; font-size: 16px;'><strong>Order ID:</strong> {}</p>\
         <p style='margin: 16px 0 0 0; font-size: 14px; opacity: 0.9;'>Your flight has been successfully booked. \
         You can use the booking reference to check your reservation on the airline's website.</p></div>",
        escape_html(order.booking_reference.as_deref().unwrap_or("pending")),
        escape_html(order.order_id.as_deref().unwrap_or("pending"))
    )
}
